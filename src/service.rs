//! Operations the HTTP layer exposes, independent of any web framework.
//!
//! Every operation validates its inputs before touching the upstream, runs
//! its pagination under a fresh [`PageBudget`], and surfaces the first
//! failure unchanged.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::KalshiError;
use crate::filter::filter_markets;
use crate::rest::types::GetMarketsParams;
use crate::rest::{KalshiRestClient, PageBudget, validate_ticker};
use crate::types::{Market, MarketStatus};

/// Result count used when the caller does not pass `limit`.
pub const DEFAULT_LIMIT: u32 = 300;
/// Largest `limit` a caller may request.
pub const MAX_LIMIT: u32 = 1000;

/// Keyword search over the market listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Markets belonging to one series.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesParams {
    #[serde(default)]
    pub series_ticker: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketList {
    pub count: usize,
    pub markets: Vec<Market>,
}

impl From<Vec<Market>> for MarketList {
    fn from(markets: Vec<Market>) -> Self {
        Self {
            count: markets.len(),
            markets,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
}

#[derive(Debug, Clone)]
pub struct OddsService {
    client: KalshiRestClient,
    pagination_deadline: Option<Duration>,
    shutdown: CancellationToken,
}

impl OddsService {
    pub fn new(client: KalshiRestClient) -> Self {
        Self {
            client,
            pagination_deadline: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Upper bound on the wall-clock time of one paginated operation.
    pub fn with_pagination_deadline(mut self, deadline: Duration) -> Self {
        self.pagination_deadline = Some(deadline);
        self
    }

    /// Cancelling `token` aborts every in-flight pagination run.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn health(&self) -> Health {
        Health { ok: true }
    }

    /// Fetch up to `limit` markets, then keep those matching `keyword`.
    ///
    /// The keyword is applied after the bounded fetch, so fewer than `limit`
    /// matches may come back even when more exist further upstream.
    pub async fn search(&self, params: SearchParams) -> Result<MarketList, KalshiError> {
        let limit = validate_limit(params.limit)?;
        let status = parse_status(params.status.as_deref())?;
        let keyword = params.keyword.as_deref();

        let markets = self
            .client
            .paginate_markets(
                GetMarketsParams {
                    status,
                    ..Default::default()
                },
                limit,
                &self.budget(),
            )
            .await?;
        let fetched = markets.len();
        let hits = filter_markets(markets, keyword);
        info!(fetched, matched = hits.len(), limit, "market search complete");
        Ok(hits.into())
    }

    /// Up to `limit` markets of `series_ticker`, unfiltered.
    pub async fn series_markets(&self, params: SeriesParams) -> Result<MarketList, KalshiError> {
        let series_ticker = params
            .series_ticker
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| KalshiError::InvalidParams("series_ticker is required".to_string()))?;
        let limit = validate_limit(params.limit)?;
        let status = parse_status(params.status.as_deref())?;

        let markets = self
            .client
            .paginate_markets(
                GetMarketsParams {
                    series_ticker: Some(series_ticker),
                    status,
                    ..Default::default()
                },
                limit,
                &self.budget(),
            )
            .await?;
        debug!(count = markets.len(), "series listing complete");
        Ok(markets.into())
    }

    /// Upstream order book for one market, passed through untouched.
    pub async fn orderbook(&self, ticker: &str) -> Result<Value, KalshiError> {
        let ticker = ticker.trim();
        validate_ticker(ticker)?;
        self.client.get_market_orderbook(ticker).await
    }

    fn budget(&self) -> PageBudget {
        PageBudget {
            cancel: self.shutdown.child_token(),
            deadline: self.pagination_deadline,
        }
    }
}

fn validate_limit(limit: Option<u32>) -> Result<usize, KalshiError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(KalshiError::InvalidParams(format!(
            "limit must be 1..={MAX_LIMIT}"
        )));
    }
    Ok(limit as usize)
}

fn parse_status(status: Option<&str>) -> Result<Option<MarketStatus>, KalshiError> {
    status
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .transpose()
}
