use crate::rest::pager::{CursorPager, PageBudget, collect_limited, page_size};
use crate::rest::types::*;
use crate::types::{ErrorResponse, Market};
use crate::{KalshiAuth, KalshiEnvironment, KalshiError, REST_PREFIX};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Per-call upstream timeout unless overridden with
/// [`KalshiRestClientBuilder::with_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Client-side pacing of upstream GET requests.
///
/// This only spaces requests out; it never retries. Set `read_rps` to `0`
/// to disable pacing.
///
/// # Default
///
/// Matches the Kalshi **Basic** tier: 20 read RPS.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum GET requests per second (0 = unlimited).
    pub read_rps: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { read_rps: 20 }
    }
}

fn build_upstream_error(
    status: StatusCode,
    bytes: &[u8],
    request_id: Option<String>,
) -> KalshiError {
    #[derive(serde::Deserialize)]
    struct WrappedErrorBody {
        error: ErrorResponse,
    }

    let raw_body = String::from_utf8_lossy(bytes).to_string();
    let normalize = |error: ErrorResponse| {
        if error.code.is_some()
            || error.message.is_some()
            || error.details.is_some()
            || error.service.is_some()
        {
            Some(error)
        } else {
            None
        }
    };
    let api_error = serde_json::from_slice::<WrappedErrorBody>(bytes)
        .ok()
        .and_then(|wrapped| normalize(wrapped.error))
        .or_else(|| {
            serde_json::from_slice::<ErrorResponse>(bytes)
                .ok()
                .and_then(normalize)
        });
    KalshiError::Upstream {
        status,
        api_error,
        raw_body,
        request_id,
    }
}

#[derive(Debug)]
struct RateLimiter {
    next: Mutex<Instant>,
    interval: Duration,
}

impl RateLimiter {
    fn new(config: RateLimitConfig) -> Self {
        let interval = if config.read_rps == 0 {
            Duration::from_secs(0)
        } else {
            Duration::from_secs_f64(1.0 / config.read_rps as f64)
        };

        Self {
            next: Mutex::new(Instant::now() - interval),
            interval,
        }
    }

    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut last = self.next.lock().await;
        let now = Instant::now();
        let scheduled = if *last + self.interval > now {
            *last + self.interval
        } else {
            now
        };
        *last = scheduled;
        drop(last);

        if scheduled > now {
            tokio::time::sleep(scheduled - now).await;
        }
    }
}

/// Builder for [`KalshiRestClient`] with transport customization.
#[derive(Debug, Clone)]
pub struct KalshiRestClientBuilder {
    env: KalshiEnvironment,
    auth: KalshiAuth,
    rate_limit_config: RateLimitConfig,
    timeout: Duration,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    http_client: Option<Client>,
}

impl KalshiRestClientBuilder {
    fn new(env: KalshiEnvironment, auth: KalshiAuth) -> Self {
        Self {
            env,
            auth,
            rate_limit_config: RateLimitConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
            user_agent: None,
            http_client: None,
        }
    }

    pub fn with_rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Use a preconfigured `reqwest::Client`; the timeout settings above are ignored.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<KalshiRestClient, KalshiError> {
        let http = if let Some(client) = self.http_client {
            client
        } else {
            let mut builder = Client::builder().timeout(self.timeout);
            if let Some(timeout) = self.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
            if let Some(user_agent) = self.user_agent {
                builder = builder.user_agent(user_agent);
            }
            builder
                .build()
                .map_err(|e| KalshiError::Config(format!("http client: {e}")))?
        };

        Ok(KalshiRestClient {
            http,
            rest_origin: self.env.rest_origin,
            auth: self.auth,
            rate_limiter: Arc::new(RateLimiter::new(self.rate_limit_config)),
        })
    }
}

/// Signed, read-only HTTP client for the Kalshi REST API.
///
/// Every request carries a fresh `KALSHI-ACCESS-*` header set. Non-200
/// answers become [`KalshiError::Upstream`] with the body preserved; network
/// failures become [`KalshiError::Transport`]. Nothing is retried.
#[derive(Debug, Clone)]
pub struct KalshiRestClient {
    http: Client,
    rest_origin: Url,
    auth: KalshiAuth,
    rate_limiter: Arc<RateLimiter>,
}

impl KalshiRestClient {
    /// Start a configurable client builder.
    pub fn builder(env: KalshiEnvironment, auth: KalshiAuth) -> KalshiRestClientBuilder {
        KalshiRestClientBuilder::new(env, auth)
    }

    fn full_path(endpoint_path: &str) -> String {
        // endpoint_path must begin with "/", e.g. "/markets"
        format!("{REST_PREFIX}{endpoint_path}")
    }

    fn build_url(&self, endpoint_path: &str) -> Result<Url, KalshiError> {
        Ok(self.rest_origin.join(&Self::full_path(endpoint_path))?)
    }

    /// Endpoint path as it will go out on the wire, minus [`REST_PREFIX`].
    ///
    /// URL parsing may normalize `path` (dot segments, backslashes, escaping);
    /// the signature has to cover what is sent, so any rewrite is rejected.
    fn wire_path<'a>(url: &'a Url, path: &str) -> Result<&'a str, KalshiError> {
        match url.path().strip_prefix(REST_PREFIX) {
            Some(sent) if sent == path => Ok(sent),
            _ => Err(KalshiError::InvalidParams(format!(
                "path `{path}` would be sent as `{}`",
                url.path()
            ))),
        }
    }

    fn insert_auth_headers(
        headers: &mut HeaderMap,
        auth: &KalshiAuth,
        method: &Method,
        endpoint_path: &str,
    ) -> Result<(), KalshiError> {
        let h = auth.build_headers(method.as_str(), endpoint_path)?;

        headers.insert(
            HeaderName::from_static("kalshi-access-key"),
            HeaderValue::from_str(&h.key).map_err(|e| KalshiError::Header(e.to_string()))?,
        );
        headers.insert(
            HeaderName::from_static("kalshi-access-timestamp"),
            HeaderValue::from_str(&h.timestamp_ms)
                .map_err(|e| KalshiError::Header(e.to_string()))?,
        );
        headers.insert(
            HeaderName::from_static("kalshi-access-signature"),
            HeaderValue::from_str(&h.signature).map_err(|e| KalshiError::Header(e.to_string()))?,
        );

        Ok(())
    }

    /// Signed `GET {origin}/trade-api/v2{path}` with `query` attached.
    ///
    /// `path` must begin with `/` and carry no query string; it is signed as-is.
    pub async fn get_json<Q, T>(&self, path: &str, query: Option<&Q>) -> Result<T, KalshiError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(path)?;
        let signed_path = Self::wire_path(&url, path)?;

        // Pace first: the timestamp must reflect send time, not queue time.
        self.rate_limiter.wait().await;

        let mut headers = HeaderMap::new();
        // IMPORTANT: sign the path without query parameters.
        Self::insert_auth_headers(&mut headers, &self.auth, &Method::GET, signed_path)?;

        let mut req = self.http.get(url).headers(headers);
        if let Some(q) = query {
            req = req.query(q);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let request_id = resp
            .headers()
            .get("x-request-id")
            .or_else(|| resp.headers().get("request-id"))
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp.bytes().await?;

        if status == StatusCode::OK {
            let body_bytes = if bytes.is_empty() {
                b"{}"
            } else {
                bytes.as_ref()
            };
            return Ok(serde_json::from_slice::<T>(body_bytes)?);
        }

        let err = build_upstream_error(status, &bytes, request_id);
        if let KalshiError::Upstream {
            status,
            api_error,
            request_id,
            ..
        } = &err
        {
            warn!(
                %status,
                path,
                request_id = request_id.as_deref().unwrap_or("-"),
                code = api_error.as_ref().and_then(|e| e.code.as_deref()).unwrap_or("-"),
                "upstream rejected request"
            );
        }
        Err(err)
    }

    // -----------------------------------------------
    // Markets
    // -----------------------------------------------

    /// Fetch one page of markets.
    pub async fn get_markets(&self, params: &GetMarketsParams) -> Result<MarketsPage, KalshiError> {
        params.validate()?;
        self.get_json("/markets", Some(params)).await
    }

    /// Get the order book for a market, passed through as raw JSON.
    pub async fn get_market_orderbook(&self, market_ticker: &str) -> Result<Value, KalshiError> {
        validate_ticker(market_ticker)?;
        let path = format!("/markets/{market_ticker}/orderbook");
        self.get_json(&path, Option::<&()>::None).await
    }

    // -----------------------------------------------
    // Pagination
    // -----------------------------------------------

    /// Create a pager for iterating over markets page by page. See [`CursorPager`].
    pub fn markets_pager(&self, params: GetMarketsParams) -> CursorPager<Market> {
        let client = self.clone();
        let base_params = params.clone();
        CursorPager::new(params.cursor.clone(), move |cursor| {
            let client = client.clone();
            let mut page_params = base_params.clone();
            page_params.cursor = cursor;
            Box::pin(async move {
                let page = client.get_markets(&page_params).await?;
                Ok((page.markets, page.cursor))
            })
        })
    }

    /// Collect up to `limit` markets across as many pages as needed.
    ///
    /// Each page requests `min(100, limit)` items. Any page failure aborts the
    /// whole run.
    pub async fn paginate_markets(
        &self,
        mut params: GetMarketsParams,
        limit: usize,
        budget: &PageBudget,
    ) -> Result<Vec<Market>, KalshiError> {
        params.limit = Some(page_size(limit));
        params.validate()?;
        debug!(limit, page_size = params.limit, "paginating markets");
        collect_limited(self.markets_pager(params), limit, budget).await
    }
}

/// Market tickers are interpolated into the path, so they must be a single
/// segment that URL normalization leaves untouched: ASCII letters, digits,
/// `-`, `_` and `.`, and never a bare `.` or `..`.
pub(crate) fn validate_ticker(ticker: &str) -> Result<(), KalshiError> {
    if ticker.is_empty() {
        return Err(KalshiError::InvalidParams("ticker must not be empty".to_string()));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if matches!(ticker, "." | "..") || !ticker.chars().all(allowed) {
        return Err(KalshiError::InvalidParams(format!(
            "ticker `{ticker}` is not a single path segment"
        )));
    }
    Ok(())
}
