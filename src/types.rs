use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::KalshiError;

/// --- Market Status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Unopened,
    Open,
    Paused,
    Closed,
    Settled,
}

impl MarketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketStatus::Unopened => "unopened",
            MarketStatus::Open => "open",
            MarketStatus::Paused => "paused",
            MarketStatus::Closed => "closed",
            MarketStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MarketStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for MarketStatus {
    type Err = KalshiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unopened" => Ok(MarketStatus::Unopened),
            "open" => Ok(MarketStatus::Open),
            "paused" => Ok(MarketStatus::Paused),
            "closed" => Ok(MarketStatus::Closed),
            "settled" => Ok(MarketStatus::Settled),
            other => Err(KalshiError::InvalidParams(format!(
                "status must be one of unopened, open, paused, closed, settled (got `{other}`)"
            ))),
        }
    }
}

/// --- Market ---

/// One upstream market record.
///
/// Kept as the raw JSON object so that every field is passed through
/// unchanged; only `title` and `ticker` are read, for keyword filtering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Market(pub Map<String, Value>);

impl Market {
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    pub fn ticker(&self) -> Option<&str> {
        self.0.get("ticker").and_then(Value::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Market {
    fn from(map: Map<String, Value>) -> Self {
        Market(map)
    }
}

/// --- Errors ---

/// Error body as returned by the trade API, either bare or wrapped in `{"error": ...}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

/// --- Serde helpers ---

pub(crate) fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
