use url::Url;

use crate::error::KalshiError;

/// Path prefix of every REST endpoint. Part of the signed message.
pub const REST_PREFIX: &str = "/trade-api/v2";

const PROD_REST_ORIGIN: &str = "https://api.elections.kalshi.com";
const DEMO_REST_ORIGIN: &str = "https://demo-api.kalshi.co";

/// Upstream deployment the proxy talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KalshiEnvironment {
    /// Scheme and host only; [`REST_PREFIX`] is appended per request.
    pub rest_origin: Url,
}

impl KalshiEnvironment {
    pub fn production() -> Self {
        Self::from_static(PROD_REST_ORIGIN)
    }

    pub fn demo() -> Self {
        Self::from_static(DEMO_REST_ORIGIN)
    }

    /// Custom origin, e.g. a local mock server in tests.
    ///
    /// Only scheme, host and port are accepted. A path, query or fragment
    /// would be dropped when [`REST_PREFIX`] is joined on, so it is an error.
    pub fn with_origin(origin: &str) -> Result<Self, KalshiError> {
        let rest_origin = Url::parse(origin)?;
        if rest_origin.cannot_be_a_base()
            || rest_origin.path() != "/"
            || rest_origin.query().is_some()
            || rest_origin.fragment().is_some()
        {
            return Err(KalshiError::Config(format!(
                "upstream origin `{origin}` must not carry a path, query or fragment"
            )));
        }
        Ok(Self { rest_origin })
    }

    /// Resolve `prod` / `demo` (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, KalshiError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Self::production()),
            "demo" => Ok(Self::demo()),
            other => Err(KalshiError::Config(format!(
                "KALSHI_ENV must be `prod` or `demo`, got `{other}`"
            ))),
        }
    }

    fn from_static(origin: &'static str) -> Self {
        Self {
            rest_origin: Url::parse(origin).expect("static origin should parse"),
        }
    }
}

impl Default for KalshiEnvironment {
    fn default() -> Self {
        Self::production()
    }
}
