use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_id, AppState};
use crate::{
    error::{AppError, AppResult},
    models::{validate_review_fields, NewReview, Review, ReviewStatus},
};

/// Fields a review update may change; absent fields are kept
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewUpdate {
    rating: Option<i32>,
    comment: Option<String>,
    status: Option<ReviewStatus>,
}

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Review>>> {
    let reviews = state.store.list_reviews().await?;
    Ok(Json(reviews))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Review>> {
    let id = parse_id(&id, "Review")?;
    let review = state
        .store
        .find_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found.".to_string()))?;
    Ok(Json(review))
}

/// Creates a review; both the user and the movie must exist
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewReview>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = payload
        .into_review(Utc::now())
        .map_err(AppError::InvalidInput)?;

    if state.store.find_user(review.user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found.".to_string()));
    }
    if state.store.find_movie(review.movie_id).await?.is_none() {
        return Err(AppError::NotFound("Movie not found.".to_string()));
    }

    state.store.insert_review(&review).await?;

    tracing::info!(
        review_id = %review.id,
        user_id = %review.user_id,
        movie_id = %review.movie_id,
        "Review created"
    );

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ReviewUpdate>,
) -> AppResult<Json<Review>> {
    let id = parse_id(&id, "Review")?;
    let mut review = state
        .store
        .find_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found.".to_string()))?;

    if let Some(rating) = update.rating {
        review.rating = rating;
    }
    if let Some(comment) = update.comment {
        review.comment = Some(comment);
    }
    if let Some(status) = update.status {
        review.status = status;
    }
    validate_review_fields(review.rating, review.comment.as_deref())
        .map_err(AppError::InvalidInput)?;
    review.last_modified = Utc::now();

    if !state.store.update_review(&review).await? {
        return Err(AppError::NotFound("Review not found.".to_string()));
    }
    Ok(Json(review))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Review>> {
    let id = parse_id(&id, "Review")?;
    let review = state
        .store
        .delete_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found.".to_string()))?;
    Ok(Json(review))
}
