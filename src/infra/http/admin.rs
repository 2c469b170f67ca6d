use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::error::AppError;
use crate::application::jobs::{EnqueueOutcome, RegenerationJob};
use crate::domain::entities::ContentItem;
use crate::domain::types::ContentStatus;

use super::{
    HttpState, category_slug,
    middleware::{log_responses, set_request_context},
};

/// Operational surface. Bind it to a private interface.
pub fn build_admin_router(state: HttpState) -> Router {
    Router::new()
        .route("/cache/flush", post(flush_cache))
        .route("/jobs", get(list_jobs))
        .route("/jobs/flush", post(flush_jobs))
        .route("/transitions", post(content_transition))
        .route("/categories/{slug}/regenerate", post(regenerate))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlushResponse {
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    new_status: ContentStatus,
    old_status: ContentStatus,
    item: ContentItem,
}

#[derive(Debug, Serialize)]
struct TransitionResponse {
    scheduled: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RegenerateResponse {
    category: String,
    outcome: EnqueueOutcome,
}

async fn flush_cache(State(state): State<HttpState>) -> Result<Response, AppError> {
    let removed = state.engine.flush_cache()?;
    info!(removed, "cache flushed");
    Ok(Json(FlushResponse { removed }).into_response())
}

async fn flush_jobs(State(state): State<HttpState>) -> Result<Response, AppError> {
    let removed = state.engine.flush_jobs().await?;
    info!(removed, "pending jobs flushed");
    Ok(Json(FlushResponse { removed }).into_response())
}

async fn list_jobs(State(state): State<HttpState>) -> Result<Json<Vec<RegenerationJob>>, AppError> {
    Ok(Json(state.engine.queue.pending().await?))
}

async fn content_transition(
    State(state): State<HttpState>,
    Json(request): Json<TransitionRequest>,
) -> Result<Response, AppError> {
    let scheduled = state
        .engine
        .transitions
        .on_content_state_changed(request.new_status, request.old_status, &request.item)
        .await?;
    Ok(Json(TransitionResponse { scheduled }).into_response())
}

async fn regenerate(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let category = category_slug(&slug)?;
    let outcome = state.engine.scheduler.schedule(&category).await?;
    Ok(Json(RegenerateResponse { category, outcome }).into_response())
}
