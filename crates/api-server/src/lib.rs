pub mod valuation_routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use dcf_engine::{CachePolicy, DcfEngine, FinancialDataNormalizer, SnapshotCache};
use market_data::YahooFinanceClient;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use valuation_core::{FinancialDataProvider, ValuationError};

/// Shared handler state. Cloned per request; everything heavy sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn FinancialDataProvider>,
    pub cache: Arc<SnapshotCache>,
    pub normalizer: FinancialDataNormalizer,
    pub engine: DcfEngine,
}

impl AppState {
    pub fn new(provider: Arc<dyn FinancialDataProvider>, cache: SnapshotCache) -> Self {
        Self {
            provider,
            cache: Arc::new(cache),
            normalizer: FinancialDataNormalizer::new(),
            engine: DcfEngine::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ValuationError> for AppError {
    fn from(err: ValuationError) -> Self {
        let status = match &err {
            ValuationError::DataValidation { .. }
            | ValuationError::InvalidFinancialData(_)
            | ValuationError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
            ValuationError::TickerNotFound(_) => StatusCode::NOT_FOUND,
            ValuationError::DataUnavailable(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {}", self.message);
        } else {
            tracing::debug!("Request rejected ({}): {}", self.status, self.message);
        }
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

/// Server settings from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cache_policy: CachePolicy,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let cache_policy = std::env::var("SNAPSHOT_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| CachePolicy::Ttl(Duration::from_secs(secs)))
            .unwrap_or(CachePolicy::ManualRefresh);

        Self {
            host,
            port,
            cache_policy,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    valuation_routes::valuation_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=info,dcf_engine=info,market_data=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!("Snapshot cache policy: {:?}", config.cache_policy);

    let provider: Arc<dyn FinancialDataProvider> = Arc::new(YahooFinanceClient::new());
    let state = AppState::new(provider, SnapshotCache::new(config.cache_policy));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("DCF API server listening on {}", addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
