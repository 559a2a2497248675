//! Process configuration, read once from the environment at start-up.
//!
//! | Variable | Default |
//! |---|---|
//! | `KALSHI_ACCESS_KEY` | required |
//! | `KALSHI_PRIVATE_KEY_PEM` or `KALSHI_PRIVATE_KEY_PATH` | one required |
//! | `SERVICE_API_KEY` | required |
//! | `KALSHI_ENV` | `prod` |
//! | `KALSHI_REST_ORIGIN` | per `KALSHI_ENV` |
//! | `UPSTREAM_TIMEOUT_SECS` | `20` |
//! | `PAGINATION_DEADLINE_SECS` | `60` (`0` disables) |
//! | `UPSTREAM_READ_RPS` | `20` (`0` disables) |
//! | `API_HOST` / `API_PORT` | `0.0.0.0` / `8000` |
//! | `CORS_ORIGINS` | any origin |

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{KalshiAuth, ServiceKey};
use crate::env::KalshiEnvironment;
use crate::error::KalshiError;
use crate::rest::{DEFAULT_TIMEOUT, KalshiRestClient, RateLimitConfig};
use crate::service::OddsService;

/// Secrets loaded at start-up. Immutable and shared for the process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub auth: KalshiAuth,
    pub service_key: Arc<ServiceKey>,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub env: KalshiEnvironment,
    pub credentials: Credentials,
    pub upstream_timeout: Duration,
    pub pagination_deadline: Option<Duration>,
    pub read_rps: u32,
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl ProxyConfig {
    /// Load from the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honored.
    pub fn from_env() -> Result<Self, KalshiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, KalshiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            var(name).ok_or_else(|| KalshiError::Config(format!("{name} is not set")))
        };

        let access_key = required("KALSHI_ACCESS_KEY")?;
        let auth = match (var("KALSHI_PRIVATE_KEY_PEM"), var("KALSHI_PRIVATE_KEY_PATH")) {
            // Single-line env values carry literal "\n" sequences.
            (Some(pem), _) => KalshiAuth::from_pem_str(access_key, &pem.replace("\\n", "\n"))?,
            (None, Some(path)) => KalshiAuth::from_pem_file(access_key, path)?,
            (None, None) => {
                return Err(KalshiError::Config(
                    "set KALSHI_PRIVATE_KEY_PEM or KALSHI_PRIVATE_KEY_PATH".to_string(),
                ));
            }
        };
        let service_key = ServiceKey::new(required("SERVICE_API_KEY")?)?;

        let env = match var("KALSHI_REST_ORIGIN") {
            Some(origin) => KalshiEnvironment::with_origin(origin.trim())?,
            None => match var("KALSHI_ENV") {
                Some(name) => KalshiEnvironment::from_name(&name)?,
                None => KalshiEnvironment::production(),
            },
        };

        let upstream_timeout = parse_or(&var, "UPSTREAM_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?;
        if upstream_timeout == 0 {
            return Err(KalshiError::Config(
                "UPSTREAM_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        let deadline_secs: u64 = parse_or(&var, "PAGINATION_DEADLINE_SECS", 60)?;

        Ok(Self {
            env,
            credentials: Credentials {
                auth,
                service_key: Arc::new(service_key),
            },
            upstream_timeout: Duration::from_secs(upstream_timeout),
            pagination_deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            read_rps: parse_or(&var, "UPSTREAM_READ_RPS", RateLimitConfig::default().read_rps)?,
            host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "API_PORT", 8000)?,
            cors_origins: var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, KalshiError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| KalshiError::Config(format!("API_HOST/API_PORT: {e}")))
    }

    pub fn rest_client(&self) -> Result<KalshiRestClient, KalshiError> {
        KalshiRestClient::builder(self.env.clone(), self.credentials.auth.clone())
            .with_timeout(self.upstream_timeout)
            .with_rate_limit_config(RateLimitConfig {
                read_rps: self.read_rps,
            })
            .with_user_agent(concat!("kalshi-odds-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
    }

    pub fn odds_service(&self) -> Result<OddsService, KalshiError> {
        let service = OddsService::new(self.rest_client()?);
        Ok(match self.pagination_deadline {
            Some(deadline) => service.with_pagination_deadline(deadline),
            None => service,
        })
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T, KalshiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| KalshiError::Config(format!("{name}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use std::collections::HashMap;
    use std::sync::OnceLock;

    fn pem() -> String {
        static PEM: OnceLock<String> = OnceLock::new();
        PEM.get_or_init(|| {
            let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("rsa key");
            key.to_pkcs8_pem(LineEnding::LF).expect("pem").to_string()
        })
        .clone()
    }

    fn load(vars: &[(&str, &str)]) -> Result<ProxyConfig, KalshiError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProxyConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let pem = pem();
        let config = load(&[
            ("KALSHI_ACCESS_KEY", "key-id"),
            ("KALSHI_PRIVATE_KEY_PEM", &pem),
            ("SERVICE_API_KEY", "svc"),
        ])
        .unwrap();

        assert_eq!(config.env, KalshiEnvironment::production());
        assert_eq!(config.upstream_timeout, Duration::from_secs(20));
        assert_eq!(config.pagination_deadline, Some(Duration::from_secs(60)));
        assert_eq!(config.read_rps, 20);
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.credentials.auth.key_id(), "key-id");
        assert!(config.credentials.service_key.verify(Some("svc")).is_ok());
    }

    #[test]
    fn escaped_newlines_in_pem_are_unescaped() {
        let escaped = pem().replace('\n', "\\n");
        let config = load(&[
            ("KALSHI_ACCESS_KEY", "key-id"),
            ("KALSHI_PRIVATE_KEY_PEM", &escaped),
            ("SERVICE_API_KEY", "svc"),
        ]);
        assert!(config.is_ok());
    }

    #[test]
    fn overrides_are_applied() {
        let pem = pem();
        let config = load(&[
            ("KALSHI_ACCESS_KEY", "key-id"),
            ("KALSHI_PRIVATE_KEY_PEM", &pem),
            ("SERVICE_API_KEY", "svc"),
            ("KALSHI_ENV", "demo"),
            ("UPSTREAM_TIMEOUT_SECS", "30"),
            ("PAGINATION_DEADLINE_SECS", "0"),
            ("UPSTREAM_READ_RPS", "0"),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9001"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();

        assert_eq!(config.env, KalshiEnvironment::demo());
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.pagination_deadline, None);
        assert_eq!(config.read_rps, 0);
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9001");
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn rest_origin_overrides_env_name() {
        let pem = pem();
        let config = load(&[
            ("KALSHI_ACCESS_KEY", "key-id"),
            ("KALSHI_PRIVATE_KEY_PEM", &pem),
            ("SERVICE_API_KEY", "svc"),
            ("KALSHI_ENV", "demo"),
            ("KALSHI_REST_ORIGIN", "http://127.0.0.1:4010"),
        ])
        .unwrap();
        assert_eq!(config.env.rest_origin.as_str(), "http://127.0.0.1:4010/");
    }

    #[test]
    fn missing_required_values_fail() {
        let pem = pem();
        assert!(matches!(
            load(&[("KALSHI_PRIVATE_KEY_PEM", &pem), ("SERVICE_API_KEY", "svc")]),
            Err(KalshiError::Config(msg)) if msg.contains("KALSHI_ACCESS_KEY")
        ));
        assert!(matches!(
            load(&[("KALSHI_ACCESS_KEY", "k"), ("SERVICE_API_KEY", "svc")]),
            Err(KalshiError::Config(_))
        ));
        assert!(matches!(
            load(&[("KALSHI_ACCESS_KEY", "k"), ("KALSHI_PRIVATE_KEY_PEM", &pem)]),
            Err(KalshiError::Config(msg)) if msg.contains("SERVICE_API_KEY")
        ));
    }

    #[test]
    fn bad_key_and_bad_numbers_fail() {
        assert!(matches!(
            load(&[
                ("KALSHI_ACCESS_KEY", "k"),
                ("KALSHI_PRIVATE_KEY_PEM", "garbage"),
                ("SERVICE_API_KEY", "svc"),
            ]),
            Err(KalshiError::Key(_))
        ));

        let pem = pem();
        assert!(matches!(
            load(&[
                ("KALSHI_ACCESS_KEY", "k"),
                ("KALSHI_PRIVATE_KEY_PEM", &pem),
                ("SERVICE_API_KEY", "svc"),
                ("API_PORT", "eighty"),
            ]),
            Err(KalshiError::Config(msg)) if msg.contains("API_PORT")
        ));
        assert!(matches!(
            load(&[
                ("KALSHI_ACCESS_KEY", "k"),
                ("KALSHI_PRIVATE_KEY_PEM", &pem),
                ("SERVICE_API_KEY", "svc"),
                ("UPSTREAM_TIMEOUT_SECS", "0"),
            ]),
            Err(KalshiError::Config(_))
        ));
    }
}
