use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use dcf_engine::{
    IndustryAssumptions, IndustryProfile, ParameterOverrides, ResolvedParameters, ScenarioModeler,
    SensitivityAnalyzer, SensitivityDeltas, ValuationReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use valuation_core::{FinancialSnapshot, RawFinancialData, ValuationError};

use crate::{ApiResponse, AppError, AppState};

pub fn valuation_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/industries", get(list_industries))
        .route("/api/fetch-data", post(fetch_data))
        .route("/api/calculate-dcf", post(calculate_dcf))
}

#[derive(Debug, Deserialize)]
pub struct FetchDataRequest {
    pub ticker: String,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct FetchDataResponse {
    pub snapshot: FinancialSnapshot,
    pub defaults: ResolvedParameters,
    pub cached: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CalculateDcfRequest {
    pub ticker: Option<String>,
    /// Raw payload; takes precedence over `ticker` and is never cached
    pub financials: Option<RawFinancialData>,
    pub parameters: ParameterOverrides,
    pub deltas: Option<SensitivityDeltas>,
    pub include_sensitivity: bool,
    pub include_scenarios: bool,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_industries() -> Json<ApiResponse<&'static [IndustryProfile]>> {
    Json(ApiResponse::success(IndustryAssumptions::all()))
}

async fn fetch_data(
    State(state): State<AppState>,
    Json(req): Json<FetchDataRequest>,
) -> Result<Json<ApiResponse<FetchDataResponse>>, AppError> {
    let (snapshot, cached) = load_snapshot(&state, &req.ticker, req.refresh).await?;
    let defaults = ParameterOverrides::default().resolve_detailed(&snapshot)?;

    Ok(Json(ApiResponse::success(FetchDataResponse {
        snapshot,
        defaults,
        cached,
    })))
}

async fn calculate_dcf(
    State(state): State<AppState>,
    Json(req): Json<CalculateDcfRequest>,
) -> Result<Json<ApiResponse<ValuationReport>>, AppError> {
    let snapshot = match (&req.financials, req.ticker.as_deref()) {
        (Some(raw), _) => state.normalizer.normalize(raw)?,
        (None, Some(ticker)) => load_snapshot(&state, ticker, false).await?.0,
        (None, None) => return Err(ValuationError::missing("ticker").into()),
    };

    let mut report = ValuationReport::base(&state.engine, snapshot, &req.parameters)?;
    tracing::info!(
        "DCF for {}: {:.2}/share (price {:.2})",
        report.snapshot.ticker,
        report.valuation.per_share_value,
        report.snapshot.current_price
    );

    let engine = state.engine;
    let params = report.parameters.parameters;
    let snapshot = Arc::new(report.snapshot.clone());

    let sensitivity = {
        let snapshot = Arc::clone(&snapshot);
        let deltas = req.deltas.clone().unwrap_or_default();
        optional_blocking(req.include_sensitivity, move || {
            SensitivityAnalyzer::new(engine).analyze(&snapshot, &params, &deltas)
        })
    };
    let scenarios = optional_blocking(req.include_scenarios, move || {
        ScenarioModeler::new(engine).model(&snapshot, &params)
    });

    let (sensitivity, scenarios) = tokio::join!(sensitivity, scenarios);
    report.sensitivity = sensitivity?;
    report.scenarios = scenarios?;

    Ok(Json(ApiResponse::success(report)))
}

/// Serve from the snapshot cache unless a refresh is requested.
async fn load_snapshot(
    state: &AppState,
    ticker: &str,
    refresh: bool,
) -> Result<(FinancialSnapshot, bool), AppError> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(ValuationError::missing("ticker").into());
    }

    if refresh {
        state.cache.invalidate(&ticker);
    } else if let Some(snapshot) = state.cache.get(&ticker) {
        tracing::debug!("Serving cached snapshot for {}", ticker);
        return Ok((snapshot, true));
    }

    let raw = state.provider.fetch(&ticker).await?;
    let snapshot = state.normalizer.normalize_into(&raw, &state.cache)?;
    if snapshot.degraded {
        tracing::warn!("{} snapshot is degraded: {:?}", snapshot.ticker, snapshot.caveats);
    }
    Ok((snapshot, false))
}

/// CPU-bound analysis off the async workers; skipped entirely when not requested.
async fn optional_blocking<T, F>(enabled: bool, f: F) -> Result<Option<T>, AppError>
where
    F: FnOnce() -> Result<T, ValuationError> + Send + 'static,
    T: Send + 'static,
{
    if !enabled {
        return Ok(None);
    }
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("analysis task failed: {}", e)))?;
    Ok(Some(result?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use dcf_engine::SnapshotCache;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use valuation_core::FinancialDataProvider;

    struct MockProvider {
        data: HashMap<String, RawFinancialData>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FinancialDataProvider for MockProvider {
        async fn fetch(&self, ticker: &str) -> Result<RawFinancialData, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ticker == "DOWN" {
                return Err(ValuationError::DataUnavailable("upstream timeout".to_string()));
            }
            self.data
                .get(ticker)
                .cloned()
                .ok_or_else(|| ValuationError::TickerNotFound(ticker.to_string()))
        }
    }

    fn raw(ticker: &str) -> RawFinancialData {
        RawFinancialData {
            ticker: Some(ticker.to_string()),
            current_price: Some(120.0),
            shares_outstanding: Some(10.0),
            sector: Some("Technology".to_string()),
            free_cash_flows: vec![90.0, 95.0, 100.0],
            revenues: vec![900.0, 950.0, 1000.0],
            cash: Some(50.0),
            total_debt: Some(20.0),
            ..Default::default()
        }
    }

    fn setup() -> (Router, Arc<MockProvider>) {
        let provider = Arc::new(MockProvider {
            data: HashMap::from([("ACME".to_string(), raw("ACME"))]),
            calls: AtomicUsize::new(0),
        });
        let state = AppState::new(provider.clone(), SnapshotCache::manual());
        (app(state), provider)
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = setup();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_industries_lists_full_table() {
        let (router, _) = setup();
        let request = Request::builder()
            .uri("/api/industries")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_fetch_data_is_cached_until_refresh() {
        let (router, provider) = setup();

        let (status, first) =
            send(&router, "POST", "/api/fetch-data", serde_json::json!({"ticker": "acme"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["cached"], false);
        assert_eq!(first["data"]["snapshot"]["ticker"], "ACME");
        assert_eq!(first["data"]["defaults"]["industry"], "technology");

        let (_, second) =
            send(&router, "POST", "/api/fetch-data", serde_json::json!({"ticker": "ACME"})).await;
        assert_eq!(second["data"]["cached"], true);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let (_, refreshed) = send(
            &router,
            "POST",
            "/api/fetch-data",
            serde_json::json!({"ticker": "ACME", "refresh": true}),
        )
        .await;
        assert_eq!(refreshed["data"]["cached"], false);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_data_unknown_ticker_is_404() {
        let (router, _) = setup();
        let (status, body) =
            send(&router, "POST", "/api/fetch-data", serde_json::json!({"ticker": "NOPE"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_502() {
        let (router, _) = setup();
        let (status, _) =
            send(&router, "POST", "/api/fetch-data", serde_json::json!({"ticker": "DOWN"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_calculate_dcf_with_analyses() {
        let (router, provider) = setup();
        let (status, body) = send(
            &router,
            "POST",
            "/api/calculate-dcf",
            serde_json::json!({
                "ticker": "ACME",
                "parameters": {"growth_rate": 0.05, "wacc": 0.10, "terminal_growth_rate": 0.02},
                "include_sensitivity": true,
                "include_scenarios": true
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert!(data["valuation"]["per_share_value"].as_f64().unwrap() > 0.0);
        assert_eq!(data["parameters"]["growth_source"], "override");
        assert_eq!(data["sensitivity"]["drivers"].as_array().unwrap().len(), 3);
        assert_eq!(data["scenarios"]["outcomes"].as_array().unwrap().len(), 3);
        assert_eq!(
            data["scenarios"]["outcomes"][1]["valuation"]["per_share_value"],
            data["valuation"]["per_share_value"]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_calculate_dcf_from_financials_skips_provider() {
        let (router, provider) = setup();
        let (status, body) = send(
            &router,
            "POST",
            "/api/calculate-dcf",
            serde_json::json!({"financials": raw("OTHER"), "ticker": "ACME"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["snapshot"]["ticker"], "OTHER");
        assert!(body["data"].get("sensitivity").is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_calculate_dcf_rejects_invalid_parameters() {
        let (router, _) = setup();
        let (status, body) = send(
            &router,
            "POST",
            "/api/calculate-dcf",
            serde_json::json!({
                "financials": raw("ACME"),
                "parameters": {"wacc": 0.03, "terminal_growth_rate": 0.03}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_calculate_dcf_requires_ticker_or_financials() {
        let (router, _) = setup();
        let (status, body) =
            send(&router, "POST", "/api/calculate-dcf", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("ticker"));
    }

    #[tokio::test]
    async fn test_calculate_dcf_reports_missing_fields() {
        let (router, _) = setup();
        let (status, body) = send(
            &router,
            "POST",
            "/api/calculate-dcf",
            serde_json::json!({"financials": {"ticker": "HALF", "current_price": 10.0}}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("shares_outstanding"));
        assert!(error.contains("free_cash_flows"));
    }
}
