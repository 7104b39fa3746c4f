use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    db::{Cache, EntityStore},
    error::{AppError, AppResult},
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::candidates::COLD_START_SAMPLE_SIZE,
};

pub mod movies;
pub mod people;
pub mod reviews;
pub mod suggestions;
pub mod users;

const DEFAULT_MOVIE_CACHE_TTL: u64 = 3600;

/// State shared by every handler
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub cache: Option<Cache>,
    pub movie_cache_ttl: u64,
    pub cold_start_sample_size: usize,
}

impl AppState {
    /// State without a cache, using default tuning
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            cache: None,
            movie_cache_ttl: DEFAULT_MOVIE_CACHE_TTL,
            cold_start_sample_size: COLD_START_SAMPLE_SIZE,
        }
    }

    pub fn with_cache(mut self, cache: Cache, ttl: u64) -> Self {
        self.cache = Some(cache);
        self.movie_cache_ttl = ttl;
        self
    }

    pub fn with_cold_start_sample_size(mut self, size: usize) -> Self {
        self.cold_start_sample_size = size;
        self
    }

    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Movies
        .route("/movies", get(movies::list).post(movies::create))
        .route("/movies/search", get(movies::search))
        .route(
            "/movies/:id",
            get(movies::get).put(movies::update).delete(movies::delete),
        )
        .route("/movies/:id/reviews", get(movies::reviews))
        .route("/movies/:id/actors", get(movies::actors))
        .route("/movies/:id/directors", get(movies::directors))
        // Actors and directors
        .route(
            "/actors",
            get(people::list::<people::Actors>).post(people::create::<people::Actors>),
        )
        .route("/actors/search", get(people::search::<people::Actors>))
        .route(
            "/actors/:id",
            get(people::get::<people::Actors>)
                .put(people::update::<people::Actors>)
                .delete(people::delete::<people::Actors>),
        )
        .route("/actors/:id/movies", get(people::movies::<people::Actors>))
        .route(
            "/directors",
            get(people::list::<people::Directors>).post(people::create::<people::Directors>),
        )
        .route("/directors/search", get(people::search::<people::Directors>))
        .route(
            "/directors/:id",
            get(people::get::<people::Directors>)
                .put(people::update::<people::Directors>)
                .delete(people::delete::<people::Directors>),
        )
        .route(
            "/directors/:id/movies",
            get(people::movies::<people::Directors>),
        )
        // Users
        .route("/users", get(users::list).post(users::signup))
        .route(
            "/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/users/:id/preferences", put(users::update_preferences))
        // Reviews
        .route("/reviews", get(reviews::list).post(reviews::create))
        .route(
            "/reviews/:id",
            get(reviews::get).put(reviews::update).delete(reviews::delete),
        )
        // Suggestions
        .route("/suggestions", get(suggestions::list))
        .route("/suggestions/generate", post(suggestions::generate))
        .route(
            "/suggestions/:id",
            put(suggestions::update_status).delete(suggestions::delete),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Parses a path or body identifier, naming the entity in the error
pub(crate) fn parse_id(raw: &str, entity: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::InvalidInput(format!("{} ID {:?} is not valid.", entity, raw)))
}

/// Parses an identifier that may be absent
pub(crate) fn require_id(raw: Option<&str>, entity: &str) -> AppResult<Uuid> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_id(raw, entity),
        None => Err(AppError::InvalidInput(format!("{} ID is required.", entity))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "Movie").unwrap(), id);
        assert!(matches!(
            parse_id("42", "Movie"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_require_id_rejects_missing_values() {
        assert!(matches!(
            require_id(None, "User"),
            Err(AppError::InvalidInput(msg)) if msg == "User ID is required."
        ));
        assert!(require_id(Some("  "), "User").is_err());
    }
}
