/// HTTP control surface: read-only status plus manual start/stop.
///
/// Intended for a trusted host; there is no authentication. Manual actions
/// do not touch the monitor's bookkeeping — the next tick resynchronizes
/// through the bootstrap rule.
use crate::config::ServeConfig;
use crate::process::MinerControl;
use crate::status::{StatusSnapshot, StatusStore};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    store: StatusStore,
    control: Arc<dyn MinerControl>,
}

pub async fn run(
    config: &ServeConfig,
    store: StatusStore,
    control: Arc<dyn MinerControl>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(AppState { store, control });

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("control surface listening on {local_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/start", get(start_miner).post(start_miner))
        .route("/stop", get(stop_miner).post(stop_miner))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.store.snapshot())
}

async fn start_miner(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, (StatusCode, String)> {
    match state.control.is_running().await {
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("error checking if miner is running: {e}"),
        )),
        Ok(true) => Ok(Json(state.store.snapshot())),
        Ok(false) => {
            if let Err(e) = state.control.start().await {
                tracing::warn!(error = %e, "manual start failed");
            }
            Ok(Json(state.store.snapshot()))
        }
    }
}

async fn stop_miner(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, (StatusCode, String)> {
    match state.control.is_running().await {
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("error checking if miner is running: {e}"),
        )),
        Ok(true) => {
            state.control.stop().await;
            Ok(Json(state.store.snapshot()))
        }
        Ok(false) => Ok(Json(state.store.snapshot())),
    }
}
