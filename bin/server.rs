// Retail Star - Reports API
// Read-only JSON over the loaded star schema (Axum)

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use retail_star::analytics::{monthly_revenue, top_products, DEFAULT_TOP_N};
use retail_star::load::{recent_runs, verify_counts};
use retail_star::pipeline::open_existing_database;
use retail_star::{logging, Config};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

const MAX_TOP_N: usize = 100;
const RECENT_RUNS: usize = 20;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError("database connection poisoned by an earlier panic".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Any failure inside a handler; always a 500 with the envelope
struct ApiError(String);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed");
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.0),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Deserialize)]
struct TopProductsQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct TableCount {
    table: String,
    rows: i64,
}

#[derive(Serialize)]
struct RunResponse {
    run_id: String,
    source: String,
    started_at: String,
    finished_at: String,
    raw_rows: i64,
    valid_rows: i64,
    fact_rows: i64,
    invalid_counts: serde_json::Value,
    fingerprint: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/reports/monthly-revenue
async fn get_monthly_revenue(
    State(state): State<AppState>,
) -> ApiResult<Vec<retail_star::MonthlyRevenue>> {
    let conn = state.conn()?;
    Ok(Json(ApiResponse::ok(monthly_revenue(&conn)?)))
}

/// GET /api/reports/top-products?limit=N
async fn get_top_products(
    State(state): State<AppState>,
    Query(query): Query<TopProductsQuery>,
) -> ApiResult<Vec<retail_star::ProductRevenue>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_N).clamp(1, MAX_TOP_N);
    let conn = state.conn()?;
    Ok(Json(ApiResponse::ok(top_products(&conn, limit)?)))
}

/// GET /api/tables - Row count per star table
async fn get_tables(State(state): State<AppState>) -> ApiResult<Vec<TableCount>> {
    let conn = state.conn()?;
    let counts = verify_counts(&conn)?
        .into_iter()
        .map(|(table, rows)| TableCount { table, rows })
        .collect();
    Ok(Json(ApiResponse::ok(counts)))
}

/// GET /api/runs - Most recent pipeline runs first
async fn get_runs(State(state): State<AppState>) -> ApiResult<Vec<RunResponse>> {
    let conn = state.conn()?;
    let runs = recent_runs(&conn, RECENT_RUNS)?
        .into_iter()
        .map(|run| RunResponse {
            run_id: run.run_id,
            source: run.source,
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.to_rfc3339(),
            raw_rows: run.raw_rows,
            valid_rows: run.valid_rows,
            fact_rows: run.fact_rows,
            invalid_counts: run.invalid_counts,
            fingerprint: run.fingerprint,
        })
        .collect();
    Ok(Json(ApiResponse::ok(runs)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/reports/monthly-revenue", get(get_monthly_revenue))
        .route("/reports/top-products", get(get_top_products))
        .route("/tables", get(get_tables))
        .route("/runs", get(get_runs))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    println!("🌐 Retail Star - Reports API");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = std::env::var_os("RETAIL_STAR_CONFIG").map(PathBuf::from);
    let config = Config::resolve(config_path.as_deref())?;

    let conn = open_existing_database(&config.database.path)?;
    println!("✓ Database opened: {}", config.database.path.display());

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let addr = config.server.addr.as_str();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/reports/monthly-revenue", addr);
    println!("\n   Press Ctrl+C to stop\n");
    info!(%addr, "reports api listening");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
