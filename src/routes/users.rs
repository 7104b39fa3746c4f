use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::{parse_id, AppState};
use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{NewUser, Preferences, ProfileChanges, User},
    services::{integrity, Deleted},
};

/// A user with their age computed at request time
#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    pub age: u32,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let age = user.age();
        Self { user, age }
    }
}

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let id = parse_id(&id, "User")?;
    let user = state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    Ok(Json(user.into()))
}

/// Registers a user; the email must not be registered yet
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<NewUser>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = payload
        .into_user(Utc::now())
        .map_err(AppError::InvalidInput)?;
    state.store.insert_user(&user).await?;

    tracing::info!(request_id = %request_id, user_id = %user.id, "User signed up");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Edits name, bio or birthdate
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(changes): Json<ProfileChanges>,
) -> AppResult<Json<UserResponse>> {
    let id = parse_id(&id, "User")?;
    let user = state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    let user = changes
        .apply(user, Utc::now())
        .map_err(AppError::InvalidInput)?;
    if !state.store.update_user(&user).await? {
        return Err(AppError::NotFound("User not found.".to_string()));
    }
    Ok(Json(user.into()))
}

/// Replaces the user's stored preferences
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(preferences): Json<Preferences>,
) -> AppResult<Json<UserResponse>> {
    let id = parse_id(&id, "User")?;
    if let Some(floor) = preferences.min_rating {
        if !(0.0..=10.0).contains(&floor) {
            return Err(AppError::InvalidInput(format!(
                "{} is not a valid rating.",
                floor
            )));
        }
    }

    let user = state
        .store
        .update_preferences(id, &preferences, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    Ok(Json(user.into()))
}

/// Deletes the user together with their reviews and suggestions
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted<User>>> {
    let id = parse_id(&id, "User")?;
    let deleted = integrity::delete_user(state.store.as_ref(), id).await?;

    tracing::info!(request_id = %request_id, user_id = %id, "User delete completed");

    Ok(Json(deleted))
}
