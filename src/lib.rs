//! # kalshi-odds-proxy
//!
//! Read-only proxy for the [Kalshi](https://kalshi.com) trade API. Callers
//! authenticate with a shared service key; the proxy signs every upstream
//! request with the operator's RSA key and walks cursor pagination on their
//! behalf.
//!
//! ## Features
//!
//! - **RSA-PSS authentication**: `KALSHI-ACCESS-*` headers signed per request
//! - **Bounded pagination**: [`collect_limited`] stops at a result limit, an
//!   exhausted cursor, an empty page, cancellation or a deadline
//! - **Keyword search**: case-insensitive match over market title and ticker
//! - **HTTP surface**: [`server::app`] exposes health, search, series and
//!   order book routes behind an `x-api-key` check
//!
//! ## Quick Start: library
//!
//! ```no_run
//! use kalshi_odds_proxy::{
//!     GetMarketsParams, KalshiAuth, KalshiEnvironment, KalshiRestClient, MarketStatus, PageBudget,
//! };
//!
//! # async fn run() -> Result<(), kalshi_odds_proxy::KalshiError> {
//! let auth = KalshiAuth::from_pem_file(
//!     std::env::var("KALSHI_ACCESS_KEY").unwrap(),
//!     std::env::var("KALSHI_PRIVATE_KEY_PATH").unwrap(),
//! )?;
//! let client = KalshiRestClient::builder(KalshiEnvironment::demo(), auth).build()?;
//!
//! let markets = client
//!     .paginate_markets(
//!         GetMarketsParams {
//!             status: Some(MarketStatus::Open),
//!             ..Default::default()
//!         },
//!         250,
//!         &PageBudget::default(),
//!     )
//!     .await?;
//! println!("fetched {} markets", markets.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick Start: server
//!
//! ```no_run
//! use kalshi_odds_proxy::ProxyConfig;
//! use kalshi_odds_proxy::server::{self, AppState};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ProxyConfig::from_env()?;
//! let state = AppState::new(config.odds_service()?, config.credentials.service_key.clone());
//! let listener = tokio::net::TcpListener::bind(config.socket_addr()?).await?;
//! axum::serve(listener, server::app(state, &config.cors_origins)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pagination
//!
//! Page-level iteration stays available through [`CursorPager`]:
//!
//! ```no_run
//! # use kalshi_odds_proxy::{GetMarketsParams, KalshiRestClient};
//! # async fn run(client: KalshiRestClient) -> Result<(), kalshi_odds_proxy::KalshiError> {
//! let mut pager = client.markets_pager(GetMarketsParams::default());
//! while let Some(page) = pager.next_page().await? {
//!     for market in page {
//!         println!("{:?}", market.ticker());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod env;
pub mod error;
pub mod filter;
pub mod rest;
pub mod server;
pub mod service;
pub mod types;

pub use auth::{KalshiAuth, KalshiAuthHeaders, ServiceKey};
pub use config::{Credentials, ProxyConfig};
pub use env::{KalshiEnvironment, REST_PREFIX};
pub use error::KalshiError;
pub use filter::filter_markets;
pub use rest::{
    CursorPager, DEFAULT_TIMEOUT, KalshiRestClient, KalshiRestClientBuilder, PageBudget,
    RateLimitConfig, collect_limited, page_size,
};
pub use service::{
    DEFAULT_LIMIT, Health, MAX_LIMIT, MarketList, OddsService, SearchParams, SeriesParams,
};

pub use rest::types::*;
pub use types::*;
