use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use constant_time_eq::constant_time_eq_32;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::{BlindedSigningKey, VerifyingKey};
use rsa::signature::{Keypair, RandomizedSigner, SignatureEncoding};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::env::REST_PREFIX;
use crate::error::KalshiError;

/// Header values for one signed upstream call.
///
/// Built fresh per request: the signature binds to `timestamp_ms`, so a set
/// of headers must never be reused for a later call.
#[derive(Debug, Clone)]
pub struct KalshiAuthHeaders {
    pub key: String,
    pub timestamp_ms: String,
    pub signature: String,
}

/// RSA-PSS request signer for the trade API.
///
/// The private key is parsed once and shared behind an `Arc`; cloning is cheap.
#[derive(Clone)]
pub struct KalshiAuth {
    key_id: String,
    signing_key: Arc<BlindedSigningKey<Sha256>>,
}

impl fmt::Debug for KalshiAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KalshiAuth")
            .field("key_id", &self.key_id)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl KalshiAuth {
    /// Parse a PEM private key (PKCS#8 `PRIVATE KEY` or PKCS#1 `RSA PRIVATE KEY`).
    pub fn from_pem_str(key_id: impl Into<String>, pem: &str) -> Result<Self, KalshiError> {
        let pem = pem.trim();
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|pkcs8_err| {
                RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                    KalshiError::Key(format!(
                        "not a PKCS#8 ({pkcs8_err}) or PKCS#1 ({pkcs1_err}) RSA key"
                    ))
                })
            })?;
        Ok(Self::from_private_key(key_id, private_key))
    }

    /// Read and parse a PEM private key from disk.
    pub fn from_pem_file(
        key_id: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, KalshiError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path)
            .map_err(|e| KalshiError::Key(format!("reading {}: {e}", path.display())))?;
        Self::from_pem_str(key_id, &pem)
    }

    pub fn from_private_key(key_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: Arc::new(BlindedSigningKey::<Sha256>::new(private_key)),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Public half of the signing key, with the same PSS parameters.
    pub fn verifying_key(&self) -> VerifyingKey<Sha256> {
        self.signing_key.verifying_key()
    }

    /// The exact bytes that get signed: `{timestamp}{METHOD}/trade-api/v2{path}`.
    ///
    /// `path` is the endpoint path without the API prefix and without a query
    /// string, e.g. `/markets`.
    pub fn canonical_message(timestamp_ms: &str, method: &str, path: &str) -> String {
        format!(
            "{timestamp_ms}{}{REST_PREFIX}{path}",
            method.to_ascii_uppercase()
        )
    }

    /// Sign one request. Returns standard base64 without line wrapping.
    ///
    /// PSS with MGF1-SHA-256 and a 32-byte salt, so two calls over the same
    /// message produce different (equally valid) signatures.
    pub fn sign(&self, timestamp_ms: &str, method: &str, path: &str) -> String {
        let message = Self::canonical_message(timestamp_ms, method, path);
        let mut rng = rand::thread_rng();
        let signature = self.signing_key.sign_with_rng(&mut rng, message.as_bytes());
        BASE64.encode(signature.to_bytes())
    }

    /// Read the wall clock and sign `method path` at that instant.
    pub fn build_headers(&self, method: &str, path: &str) -> Result<KalshiAuthHeaders, KalshiError> {
        let timestamp_ms = millis_since_epoch(SystemTime::now())?.to_string();
        let signature = self.sign(&timestamp_ms, method, path);
        Ok(KalshiAuthHeaders {
            key: self.key_id.clone(),
            timestamp_ms,
            signature,
        })
    }
}

fn millis_since_epoch(now: SystemTime) -> Result<u128, KalshiError> {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .map_err(|e| KalshiError::Config(format!("system clock is before the unix epoch: {e}")))
}

/// Shared secret inbound callers present in the `x-api-key` header.
#[derive(Debug)]
pub struct ServiceKey(SecretString);

impl ServiceKey {
    pub fn new(secret: impl Into<String>) -> Result<Self, KalshiError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(KalshiError::Config("service key must not be empty".to_string()));
        }
        Ok(Self(SecretString::from(secret)))
    }

    /// `Ok` only when `presented` equals the configured key.
    ///
    /// Both sides are hashed to SHA-256 first so the comparison time does not
    /// depend on either length.
    pub fn verify(&self, presented: Option<&str>) -> Result<(), KalshiError> {
        // The configured key is never empty, so a missing header cannot match.
        let presented: [u8; 32] = Sha256::digest(presented.unwrap_or_default()).into();
        let expected: [u8; 32] = Sha256::digest(self.0.expose_secret()).into();
        if constant_time_eq_32(&presented, &expected) {
            Ok(())
        } else {
            Err(KalshiError::Unauthorized)
        }
    }
}
