// Tile Scorekeeper - HTTP transport
// A chat platform webhook (or any client) posts commands, text and button
// callbacks; every reply is plain display data for the client to render.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tile_scorekeeper::{Command, Config, Report, Reply, ScoreError, SessionManager, VERSION};

/// Shared application state
#[derive(Clone)]
struct AppState {
    manager: Arc<Mutex<SessionManager>>,
    report_limit: usize,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct TextRequest {
    text: String,
}

#[derive(Deserialize)]
struct CallbackRequest {
    data: String,
}

#[derive(Deserialize)]
struct ReportQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ReportResponse {
    report: Report,
    text: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// Run `f` with exclusive access to the manager; one command at a time
fn with_manager<F>(state: &AppState, f: F) -> Response
where
    F: FnOnce(&mut SessionManager) -> Result<Reply, ScoreError>,
{
    let Ok(mut manager) = state.manager.lock() else {
        error!("Session manager lock poisoned");
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "State unavailable".to_string());
    };

    match f(&mut *manager) {
        Ok(reply) => ApiResponse::ok(reply),
        Err(err) => {
            error!(error = %err, "Command failed fatally");
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/players - Current roster
async fn get_players(State(state): State<AppState>) -> Response {
    match state.manager.lock() {
        Ok(manager) => ApiResponse::ok(manager.players().to_vec()),
        Err(_) => failure(StatusCode::INTERNAL_SERVER_ERROR, "State unavailable".to_string()),
    }
}

/// GET /api/report?limit=N - Recent rounds
async fn get_report(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> Response {
    let limit = query.limit.unwrap_or(state.report_limit);
    if limit == 0 {
        return failure(StatusCode::BAD_REQUEST, "limit must be at least 1".to_string());
    }

    match state.manager.lock() {
        Ok(manager) => {
            let report = tile_scorekeeper::ReportGenerator::render(manager.history(), limit);
            let text = report.to_text();
            ApiResponse::ok(ReportResponse { report, text })
        }
        Err(_) => failure(StatusCode::INTERNAL_SERVER_ERROR, "State unavailable".to_string()),
    }
}

/// POST /api/command - Structured command
async fn post_command(State(state): State<AppState>, Json(command): Json<Command>) -> Response {
    with_manager(&state, |manager| manager.handle(command))
}

/// POST /api/text - Free text, routed by the current state
async fn post_text(State(state): State<AppState>, Json(request): Json<TextRequest>) -> Response {
    with_manager(&state, |manager| manager.handle_text(&request.text))
}

/// POST /api/callback - Button press carrying option data
async fn post_callback(
    State(state): State<AppState>,
    Json(request): Json<CallbackRequest>,
) -> Response {
    with_manager(&state, |manager| manager.handle_callback(&request.data))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/players", get(get_players))
        .route("/report", get(get_report))
        .route("/command", post(post_command))
        .route("/text", post(post_text))
        .route("/callback", post(post_callback))
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
    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let manager = SessionManager::from_config(&config)?;
    info!(
        storage = %manager.history().storage_description(),
        players = manager.players().len(),
        rounds = manager.history().len(),
        "State loaded"
    );

    // Create shared state
    let state = AppState {
        manager: Arc::new(Mutex::new(manager)),
        report_limit: config.report_limit,
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    info!(addr = %config.server_addr, version = VERSION, "Scorekeeper server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
