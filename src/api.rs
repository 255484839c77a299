//! HTTP API for the Fator R engine.
//!
//! This module exposes the calculation engine as a small JSON API
//! using the [`axum`](https://crates.io/crates/axum) framework.  The
//! server owns the annex tables (loaded once at startup) and a
//! registry of rate estimators keyed by [`SavingsMode`]; handlers
//! only read from that state.

use crate::config::Settings;
use crate::engine::{evaluate, evaluate_batch, CalculationOutcome};
use crate::error::{CnpjIssue, EngineError};
use crate::format::{check_cnpj, format_cnpj};
use crate::models::CalculationRequest;
use crate::simulation::{simulate, SimulationInput, SimulationResult};
use crate::tax::{
    effective_rate, estimated_annual_savings, lookup_bracket, Annex, AnnexTable, AnnexTables, BracketEstimator,
    BracketRate, FlatAverageEstimator, RateEstimator, SavingsMode,
};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Application state shared across requests.
pub struct AppState {
    pub tables: Arc<AnnexTables>,
    pub estimators: HashMap<SavingsMode, Arc<dyn RateEstimator>>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(tables: AnnexTables, settings: Settings) -> Self {
        let tables = Arc::new(tables);
        let mut estimators: HashMap<SavingsMode, Arc<dyn RateEstimator>> = HashMap::new();
        estimators.insert(SavingsMode::FlatAverage, Arc::new(FlatAverageEstimator::standard()));
        estimators.insert(SavingsMode::FlatFloor, Arc::new(FlatAverageEstimator::nominal_floor()));
        estimators.insert(SavingsMode::Bracket, Arc::new(BracketEstimator::new(tables.clone())));
        Self {
            tables,
            estimators,
            settings,
        }
    }

    fn estimator(&self, mode: SavingsMode) -> Result<Arc<dyn RateEstimator>, ApiError> {
        self.estimators
            .get(&mode)
            .cloned()
            .ok_or_else(|| ApiError::Engine(EngineError::OutOfRange(format!("no estimator registered for '{}'", mode.key()))))
    }
}

/// Errors returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    NotFound(String),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Engine(err) => {
                let status = if err.is_user_error() {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    error!("tax table configuration defect: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.kind(), err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };
        let body = Json(serde_json::json!({ "error": message, "kind": kind }));
        (status, body).into_response()
    }
}

/// Build the API router.  Annex tables come from the built-in set,
/// overridden by `settings.tables_dir` when configured.
pub fn build_router(settings: Settings) -> Result<(Router, Arc<AppState>)> {
    let tables = match &settings.tables_dir {
        Some(dir) => AnnexTables::from_dir(dir)?,
        None => AnnexTables::simples_nacional(),
    };
    let state = Arc::new(AppState::new(tables, settings));
    let router = Router::new()
        .route("/api/calculate", post(calculate_handler))
        .route("/api/calculate/batch", post(batch_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/savings", post(savings_handler))
        .route("/api/brackets/lookup", post(bracket_lookup_handler))
        .route("/api/brackets/:annex", get(brackets_handler))
        .route("/api/cnpj", post(cnpj_handler))
        .with_state(state.clone());
    Ok((router, state))
}

#[derive(Debug, Default, Deserialize)]
struct ModeParams {
    #[serde(default)]
    mode: SavingsMode,
}

/// Handler for POST /api/calculate
async fn calculate_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ModeParams>,
    Json(request): Json<CalculationRequest>,
) -> Result<Json<CalculationOutcome>, ApiError> {
    let estimator = state.estimator(params.mode)?;
    let outcome = evaluate(&request, Utc::now(), estimator.as_ref())?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchItem {
    Ok(CalculationOutcome),
    Err { error: String, kind: &'static str },
}

/// Handler for POST /api/calculate/batch
async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ModeParams>,
    Json(requests): Json<Vec<CalculationRequest>>,
) -> Result<Json<Vec<BatchItem>>, ApiError> {
    let estimator = state.estimator(params.mode)?;
    let now = Utc::now();
    let results = tokio::task::spawn_blocking(move || evaluate_batch(&requests, now, estimator.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let items = results
        .into_iter()
        .map(|result| match result {
            Ok(outcome) => BatchItem::Ok(outcome),
            Err(err) => BatchItem::Err {
                error: err.to_string(),
                kind: err.kind(),
            },
        })
        .collect();
    Ok(Json(items))
}

/// Handler for POST /api/simulate
async fn simulate_handler(
    State(state): State<Arc<AppState>>,
    Json(mut input): Json<SimulationInput>,
) -> Result<Json<SimulationResult>, ApiError> {
    input.salary_basis = input.salary_basis.or(Some(state.settings.salary_basis));
    Ok(Json(simulate(&input)?))
}

fn default_from() -> Annex {
    Annex::V
}

fn default_to() -> Annex {
    Annex::III
}

#[derive(Debug, Deserialize)]
struct SavingsRequest {
    revenue: f64,
    #[serde(default = "default_from")]
    from: Annex,
    #[serde(default = "default_to")]
    to: Annex,
    #[serde(default)]
    mode: SavingsMode,
}

#[derive(Debug, Serialize)]
struct SavingsResponse {
    savings: f64,
    mode: SavingsMode,
}

/// Handler for POST /api/savings
async fn savings_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SavingsRequest>,
) -> Result<Json<SavingsResponse>, ApiError> {
    let estimator = state.estimator(request.mode)?;
    let savings = estimated_annual_savings(request.revenue, request.from, request.to, estimator.as_ref())?;
    Ok(Json(SavingsResponse {
        savings,
        mode: request.mode,
    }))
}

/// Handler for GET /api/brackets/:annex
async fn brackets_handler(
    State(state): State<Arc<AppState>>,
    Path(annex): Path<String>,
) -> Result<Json<AnnexTable>, ApiError> {
    let annex: Annex = annex.parse().map_err(ApiError::NotFound)?;
    Ok(Json(state.tables.get(annex)?.clone()))
}

#[derive(Debug, Deserialize)]
struct LookupRequest {
    annex: Annex,
    revenue: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    annex: Annex,
    bracket: BracketRate,
    effective_rate: f64,
}

/// Handler for POST /api/brackets/lookup
async fn bracket_lookup_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<LookupResponse>, ApiError> {
    let table = state.tables.get(request.annex)?;
    let bracket = lookup_bracket(table, request.revenue)?;
    Ok(Json(LookupResponse {
        annex: request.annex,
        bracket,
        effective_rate: effective_rate(table, request.revenue)?,
    }))
}

#[derive(Debug, Deserialize)]
struct CnpjRequest {
    cnpj: String,
}

#[derive(Debug, Serialize)]
struct CnpjResponse {
    valid: bool,
    formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    issue: Option<CnpjIssue>,
}

/// Handler for POST /api/cnpj
async fn cnpj_handler(Json(request): Json<CnpjRequest>) -> Result<Json<CnpjResponse>, ApiError> {
    let issue = match check_cnpj(&request.cnpj) {
        Ok(_) => None,
        Err(EngineError::MalformedIdentifier(issue)) => Some(issue),
        Err(other) => return Err(other.into()),
    };
    Ok(Json(CnpjResponse {
        valid: issue.is_none(),
        formatted: format_cnpj(&request.cnpj),
        issue,
    }))
}

/// Launch the API server.  Blocks until the server terminates.
pub async fn serve(settings: Settings) -> Result<()> {
    let addr = settings.bind_addr.clone();
    let (router, _state) = build_router(settings)?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        build_router(Settings::default()).unwrap().0
    }

    async fn send(method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_calculate_endpoint() {
        let (status, body) = send(
            "POST",
            "/api/calculate",
            Some(json!({"revenue": "500.000,00", "payroll": "100.000,00", "activity": "servicos"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["factorR"], 20.0);
        assert_eq!(body["band"], "near_threshold");
        assert_eq!(body["calculation"]["factorR"], 20.0);
        assert_eq!(body["analysis"]["savings"]["amount"], 30000.0);
    }

    #[tokio::test]
    async fn test_calculate_bracket_mode() {
        let (status, body) = send(
            "POST",
            "/api/calculate?mode=bracket",
            Some(json!({"revenue": "500.000,00", "payroll": "100.000,00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analysis"]["savings"]["amount"], 37740.0);
    }

    #[tokio::test]
    async fn test_calculate_rejects_invalid_input() {
        let (status, body) = send(
            "POST",
            "/api/calculate",
            Some(json!({"revenue": "100,00", "payroll": "150,00"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn test_batch_endpoint() {
        let (status, body) = send(
            "POST",
            "/api/calculate/batch",
            Some(json!([
                {"revenue": "500.000,00", "payroll": "150.000,00"},
                {"revenue": "", "payroll": ""}
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["factorR"], 30.0);
        assert_eq!(body[1]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn test_simulate_endpoint() {
        let (status, body) = send(
            "POST",
            "/api/simulate",
            Some(json!({
                "currentRevenue": 1000000.0,
                "currentPayroll": 250000.0,
                "revenueGrowthPct": 10.0,
                "payrollGrowthPct": 5.0,
                "newHires": 2,
                "avgSalaryPerHire": 60000.0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projectedFactorR"], 35.68);
        assert_eq!(body["salaryBasis"], "annual");
    }

    #[tokio::test]
    async fn test_savings_endpoint() {
        let (status, body) = send(
            "POST",
            "/api/savings",
            Some(json!({"revenue": 100000.0, "mode": "flat-floor"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["savings"], 9500.0);
    }

    #[tokio::test]
    async fn test_brackets_endpoints() {
        let (status, body) = send("GET", "/api/brackets/iii", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["annex"], "III");
        assert_eq!(body["brackets"].as_array().unwrap().len(), 6);

        let (status, _) = send("GET", "/api/brackets/vi", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            "POST",
            "/api/brackets/lookup",
            Some(json!({"annex": "V", "revenue": 250000.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bracket"]["tier"], 2);
    }

    #[tokio::test]
    async fn test_cnpj_endpoint() {
        let (_, body) = send("POST", "/api/cnpj", Some(json!({"cnpj": "11222333000181"}))).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["formatted"], "11.222.333/0001-81");

        let (_, body) = send("POST", "/api/cnpj", Some(json!({"cnpj": "00.000.000/0000-00"}))).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["issue"]["reason"], "repeated_digits");
    }
}
