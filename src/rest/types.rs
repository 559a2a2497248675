use crate::error::KalshiError;
use crate::types::{Market, MarketStatus, deserialize_null_as_empty_vec};
use serde::{Deserialize, Serialize};

/// Upstream hard ceiling on `limit` for one page of `GET /markets`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// --- Markets ---

/// GET /markets query params and constraints
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetMarketsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>, // max 100 per page
    /// Opaque; forwarded exactly as the previous page returned it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_ticker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MarketStatus>,
}

impl GetMarketsParams {
    pub fn validate(&self) -> Result<(), KalshiError> {
        if let Some(limit) = self.limit
            && (limit == 0 || limit > MAX_PAGE_SIZE)
        {
            return Err(KalshiError::InvalidParams(format!(
                "GET /markets: limit must be 1..={MAX_PAGE_SIZE}"
            )));
        }
        if let Some(series) = &self.series_ticker
            && series.trim().is_empty()
        {
            return Err(KalshiError::InvalidParams(
                "GET /markets: series_ticker must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// One page of `GET /markets`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsPage {
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub markets: Vec<Market>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_serialize_only_set_fields() {
        let params = GetMarketsParams {
            limit: Some(100),
            status: Some(MarketStatus::Open),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"limit": 100, "status": "open"})
        );
    }

    #[test]
    fn limit_outside_page_bounds_is_rejected() {
        for limit in [0, 101, 1000] {
            let params = GetMarketsParams {
                limit: Some(limit),
                ..Default::default()
            };
            assert!(matches!(params.validate(), Err(KalshiError::InvalidParams(_))));
        }
        let ok = GetMarketsParams {
            limit: Some(100),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn blank_series_ticker_is_rejected() {
        let params = GetMarketsParams {
            series_ticker: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn page_tolerates_null_markets_and_missing_cursor() {
        let page: MarketsPage = serde_json::from_value(json!({"markets": null})).unwrap();
        assert!(page.markets.is_empty());
        assert!(page.cursor.is_none());

        let page: MarketsPage = serde_json::from_value(json!({
            "markets": [{"ticker": "A"}, {"ticker": "B"}],
            "cursor": "abc=="
        }))
        .unwrap();
        assert_eq!(page.markets.len(), 2);
        assert_eq!(page.cursor.as_deref(), Some("abc=="));
    }
}
