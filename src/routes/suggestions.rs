use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_id, require_id, AppState};
use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{Suggestion, SuggestionStatus},
    services::{suggestions, GenerationOutcome, SuggestionView},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserQuery {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    status: SuggestionStatus,
}

/// A user's suggestions with each movie expanded to a summary
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<SuggestionView>>> {
    let user_id = require_id(query.user_id.as_deref(), "User")?;
    let views = suggestions::list_for_user(
        state.store.as_ref(),
        state.cache(),
        state.movie_cache_ttl,
        user_id,
    )
    .await?;
    Ok(Json(views))
}

/// Generates suggestions for the user named in the body
///
/// Responds 201 when anything was written and 200 for a no-op run.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<UserQuery>,
) -> AppResult<(StatusCode, Json<GenerationOutcome>)> {
    let user_id = require_id(body.user_id.as_deref(), "User")?;

    tracing::info!(request_id = %request_id, user_id = %user_id, "Generating suggestions");

    let outcome = suggestions::generate_suggestions(
        state.store.as_ref(),
        user_id,
        state.cold_start_sample_size,
    )
    .await?;

    let status = if outcome.written > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> AppResult<Json<Suggestion>> {
    let id = parse_id(&id, "Suggestion")?;
    let suggestion = suggestions::update_status(state.store.as_ref(), id, update.status).await?;
    Ok(Json(suggestion))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Suggestion>> {
    let id = parse_id(&id, "Suggestion")?;
    let suggestion = state
        .store
        .delete_suggestion(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Suggestion not found.".to_string()))?;
    Ok(Json(suggestion))
}
