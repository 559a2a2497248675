//! Axum routes over [`OddsService`].
//!
//! | Route | Key required |
//! |---|---|
//! | `GET /health` | no |
//! | `GET /odds/search?keyword&status&limit` | yes |
//! | `GET /odds/series?series_ticker&status&limit` | yes |
//! | `GET /odds/orderbook?ticker` | yes |
//!
//! Errors are returned as `{"detail": ...}`. Upstream failures keep the
//! upstream status code and body text.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::ServiceKey;
use crate::error::KalshiError;
use crate::service::{Health, MarketList, OddsService, SearchParams, SeriesParams};

/// Header carrying the shared service key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<OddsService>,
    pub service_key: Arc<ServiceKey>,
}

impl AppState {
    pub fn new(service: OddsService, service_key: Arc<ServiceKey>) -> Self {
        Self {
            service: Arc::new(service),
            service_key,
        }
    }
}

/// [`KalshiError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub KalshiError);

impl From<KalshiError> for ApiError {
    fn from(err: KalshiError) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(KalshiError::InvalidParams(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            KalshiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            KalshiError::Upstream {
                status, raw_body, ..
            } => (
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
                raw_body.clone(),
            ),
            KalshiError::InvalidParams(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            KalshiError::Transport(_) => (StatusCode::BAD_GATEWAY, self.0.to_string()),
            KalshiError::Cancelled | KalshiError::DeadlineExceeded => {
                (StatusCode::GATEWAY_TIMEOUT, self.0.to_string())
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        if status.is_server_error() {
            error!(%status, error = %self.0, "request failed");
        } else if !matches!(self.0, KalshiError::Unauthorized) {
            warn!(%status, error = %self.0, "request rejected");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Extractor that admits only callers presenting the configured service key.
///
/// Place it before any other extractor so a bad key is rejected before the
/// query is even parsed.
#[derive(Debug, Clone, Copy)]
pub struct RequireServiceKey;

impl FromRequestParts<AppState> for RequireServiceKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        state.service_key.verify(presented)?;
        Ok(Self)
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderbookQuery {
    #[serde(default)]
    pub ticker: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(state.service.health())
}

async fn search(
    _key: RequireServiceKey,
    State(state): State<AppState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<MarketList>, ApiError> {
    let Query(params) = query?;
    Ok(Json(state.service.search(params).await?))
}

async fn series(
    _key: RequireServiceKey,
    State(state): State<AppState>,
    query: Result<Query<SeriesParams>, QueryRejection>,
) -> Result<Json<MarketList>, ApiError> {
    let Query(params) = query?;
    Ok(Json(state.service.series_markets(params).await?))
}

async fn orderbook(
    _key: RequireServiceKey,
    State(state): State<AppState>,
    query: Result<Query<OrderbookQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = query?;
    let ticker = params
        .ticker
        .ok_or_else(|| KalshiError::InvalidParams("ticker is required".to_string()))?;
    Ok(Json(state.service.orderbook(&ticker).await?))
}

/// Routes only, without CORS or tracing layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/odds/search", get(search))
        .route("/odds/series", get(series))
        .route("/odds/orderbook", get(orderbook))
        .with_state(state)
}

/// Full application: routes plus CORS and request tracing.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    router(state)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// GET-only CORS. An empty origin list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let allow_origin = if parsed.is_empty() {
        if !origins.is_empty() {
            warn!("CORS_ORIGINS contains no valid origins, allowing any");
        }
        AllowOrigin::any()
    } else {
        info!("CORS configured with {} allowed origins", parsed.len());
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use reqwest::StatusCode as UpstreamStatus;

    async fn render(err: KalshiError) -> (StatusCode, Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn unauthorized_renders_401() {
        let (status, body) = render(KalshiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"detail": "Unauthorized"}));
    }

    #[tokio::test]
    async fn upstream_error_passes_status_and_body_through() {
        let (status, body) = render(KalshiError::Upstream {
            status: UpstreamStatus::TOO_MANY_REQUESTS,
            api_error: None,
            raw_body: r#"{"error":{"code":"too_many_requests"}}"#.to_string(),
            request_id: None,
        })
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body,
            json!({"detail": r#"{"error":{"code":"too_many_requests"}}"#})
        );
    }

    #[tokio::test]
    async fn validation_and_deadline_map_to_distinct_statuses() {
        let (status, _) = render(KalshiError::InvalidParams("limit".to_string())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = render(KalshiError::DeadlineExceeded).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let (status, _) = render(KalshiError::Config("x".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
