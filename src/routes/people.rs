//! Handlers shared by `/actors` and `/directors`
//!
//! The two collections have identical shapes, so each handler is generic over
//! a marker type naming the collection.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_id, AppState};
use crate::{
    error::{AppError, AppResult},
    models::{NewPerson, Person, PersonChanges, PersonKind},
    services::{integrity, movies::invalidate_movie, Deleted},
};

/// Names the credit collection a handler serves
pub trait Credit: Send + Sync + 'static {
    const KIND: PersonKind;
}

pub struct Actors;

impl Credit for Actors {
    const KIND: PersonKind = PersonKind::Actor;
}

pub struct Directors;

impl Credit for Directors {
    const KIND: PersonKind = PersonKind::Director;
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    name: Option<String>,
}

pub async fn list<C: Credit>(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Person>>> {
    let people = state.store.list_people(C::KIND).await?;
    Ok(Json(people))
}

pub async fn search<C: Credit>(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Person>>> {
    let name = query
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("A name to search for is required.".to_string()))?;
    let people = state.store.search_people(C::KIND, name.trim()).await?;
    Ok(Json(people))
}

pub async fn get<C: Credit>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Person>> {
    let id = parse_id(&id, &C::KIND.to_string())?;
    let person = state
        .store
        .find_person(C::KIND, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found.", C::KIND)))?;
    Ok(Json(person))
}

/// Creates the person and credits them on every listed movie
pub async fn create<C: Credit>(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPerson>,
) -> AppResult<(StatusCode, Json<Person>)> {
    let person = payload
        .into_person(C::KIND, Utc::now())
        .map_err(AppError::InvalidInput)?;

    let found = state.store.find_movies(&person.movies).await?;
    if found.len() != person.movies.len() {
        return Err(AppError::NotFound("Movie not found.".to_string()));
    }

    state.store.insert_person(C::KIND, &person).await?;
    for movie_id in &person.movies {
        invalidate_movie(state.cache(), *movie_id).await;
    }

    tracing::info!(kind = %C::KIND, person_id = %person.id, "Person created");

    Ok((StatusCode::CREATED, Json(person)))
}

/// Applies a partial update; credited movies are left as they are
pub async fn update<C: Credit>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(changes): Json<PersonChanges>,
) -> AppResult<Json<Person>> {
    let id = parse_id(&id, &C::KIND.to_string())?;
    let person = state
        .store
        .find_person(C::KIND, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found.", C::KIND)))?;

    let person = changes
        .apply(C::KIND, person, Utc::now())
        .map_err(AppError::InvalidInput)?;
    if !state.store.update_person(C::KIND, &person).await? {
        return Err(AppError::NotFound(format!("{} not found.", C::KIND)));
    }

    tracing::info!(kind = %C::KIND, person_id = %id, "Person updated");

    Ok(Json(person))
}

/// Deletes the person and removes them from every movie's credits
pub async fn delete<C: Credit>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted<Person>>> {
    let id = parse_id(&id, &C::KIND.to_string())?;
    let deleted = integrity::delete_person(state.store.as_ref(), C::KIND, id).await?;
    for movie_id in &deleted.deleted.movies {
        invalidate_movie(state.cache(), *movie_id).await;
    }
    Ok(Json(deleted))
}

/// Titles of the movies the person is credited on
pub async fn movies<C: Credit>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let id = parse_id(&id, &C::KIND.to_string())?;
    let person = state
        .store
        .find_person(C::KIND, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found.", C::KIND)))?;

    let mut titles: Vec<String> = state
        .store
        .find_movies(&person.movies)
        .await?
        .into_iter()
        .map(|movie| movie.title)
        .collect();
    titles.sort();
    Ok(Json(titles))
}
