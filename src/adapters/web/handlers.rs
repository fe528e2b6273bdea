//! HTTP request handlers for web adapter.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

use crate::domain::rebalance::run_backtest as run_backtest_engine;
use crate::domain::request::{BacktestRequest, BacktestResponse};

use super::{AppState, WebError};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BacktestRequest>, JsonRejection>,
) -> Result<Json<BacktestResponse>, WebError> {
    let Json(request) = payload?;
    let request = request.validate()?;

    let data_port = Arc::clone(&state.data_port);
    let default_boundary = state.settings.run_end;

    // The engine is synchronous; keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || {
        run_backtest_engine(&*data_port, &request, default_boundary)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "backtest task failed");
        WebError::internal()
    })??;

    Ok(Json(BacktestResponse::from(result)))
}

pub async fn not_found() -> WebError {
    WebError::not_found("not found")
}
