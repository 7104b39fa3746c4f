use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_id, AppState};
use crate::{
    db::store::{MovieFilter, Reference},
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{ContentAdvisory, Movie, MovieChanges, NewMovie, Person, PersonKind, Review},
    services::{integrity, movies, Deleted},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    /// Comma-separated genre labels
    genres: Option<String>,
    violence: bool,
    vulgar_language: bool,
    sexual_content: bool,
    drug_use: bool,
}

impl ListQuery {
    fn into_filter(self) -> MovieFilter {
        let genres = self
            .genres
            .map(|genres| {
                genres
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        MovieFilter {
            genres,
            advisory: ContentAdvisory {
                violence: self.violence,
                vulgar_language: self.vulgar_language,
                sexual_content: self.sexual_content,
                drug_use: self.drug_use,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    title: Option<String>,
}

/// Lists movies, optionally filtered by genre and content advisory
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Movie>>> {
    let movies = state.store.list_movies(&query.into_filter()).await?;
    Ok(Json(movies))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Movie>>> {
    let title = query
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("A title to search for is required.".to_string()))?;
    let movies = state.store.search_movies(title.trim()).await?;
    Ok(Json(movies))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Movie>> {
    let id = parse_id(&id, "Movie")?;
    let movie =
        movies::get_movie(state.store.as_ref(), state.cache(), state.movie_cache_ttl, id).await?;
    Ok(Json(movie))
}

/// Creates a movie and credits it on the referenced actors and directors
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<NewMovie>,
) -> AppResult<(StatusCode, Json<Movie>)> {
    payload.validate().map_err(AppError::InvalidInput)?;
    let movie = payload.into_movie(Utc::now());

    for kind in [PersonKind::Actor, PersonKind::Director] {
        let credits = movie.credits(kind);
        let found = state.store.find_people(kind, credits).await?;
        if found.len() != credits.len() {
            return Err(AppError::NotFound(format!("{} not found.", kind)));
        }
    }

    state.store.insert_movie(&movie).await?;

    tracing::info!(
        request_id = %request_id,
        movie_id = %movie.id,
        title = %movie.title,
        "Movie created"
    );

    Ok((StatusCode::CREATED, Json(movie)))
}

/// Applies a partial update and drops the cached copy
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(changes): Json<MovieChanges>,
) -> AppResult<Json<Movie>> {
    let id = parse_id(&id, "Movie")?;
    let movie = state
        .store
        .find_movie(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found.".to_string()))?;

    let movie = changes
        .apply(movie, Utc::now())
        .map_err(AppError::InvalidInput)?;
    if !state.store.update_movie(&movie).await? {
        return Err(AppError::NotFound("Movie not found.".to_string()));
    }
    movies::invalidate_movie(state.cache(), id).await;

    tracing::info!(request_id = %request_id, movie_id = %id, "Movie updated");

    Ok(Json(movie))
}

/// Deletes a movie along with its reviews, suggestions and credits
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted<Movie>>> {
    let id = parse_id(&id, "Movie")?;
    let deleted = integrity::delete_movie(state.store.as_ref(), id).await?;
    movies::invalidate_movie(state.cache(), id).await;

    tracing::info!(request_id = %request_id, movie_id = %id, "Movie delete completed");

    Ok(Json(deleted))
}

pub async fn reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Review>>> {
    let id = parse_id(&id, "Movie")?;
    if state.store.find_movie(id).await?.is_none() {
        return Err(AppError::NotFound("Movie not found.".to_string()));
    }
    let reviews = state.store.reviews_for(Reference::Movie(id)).await?;
    Ok(Json(reviews))
}

pub async fn actors(
    state: State<Arc<AppState>>,
    id: Path<String>,
) -> AppResult<Json<Vec<Person>>> {
    credited(state, id, PersonKind::Actor).await
}

pub async fn directors(
    state: State<Arc<AppState>>,
    id: Path<String>,
) -> AppResult<Json<Vec<Person>>> {
    credited(state, id, PersonKind::Director).await
}

async fn credited(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    kind: PersonKind,
) -> AppResult<Json<Vec<Person>>> {
    let id = parse_id(&id, "Movie")?;
    let movie =
        movies::get_movie(state.store.as_ref(), state.cache(), state.movie_cache_ttl, id).await?;
    let people = state.store.find_people(kind, movie.credits(kind)).await?;
    Ok(Json(people))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_splits_genres() {
        let query = ListQuery {
            genres: Some("Comedy, Drama,,".to_string()),
            violence: true,
            ..Default::default()
        };
        let filter = query.into_filter();
        assert_eq!(filter.genres, vec!["Comedy".to_string(), "Drama".to_string()]);
        assert!(filter.advisory.violence);
        assert!(!filter.advisory.drug_use);
    }
}
