mod client;
mod pager;
pub mod types;

pub use client::{DEFAULT_TIMEOUT, KalshiRestClient, KalshiRestClientBuilder, RateLimitConfig};
pub(crate) use client::validate_ticker;
pub use pager::{CursorPager, PageBudget, collect_limited, page_size};
