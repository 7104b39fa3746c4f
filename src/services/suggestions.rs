use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    candidates::{select_candidates, CandidateSource},
    movies::load_movies,
    preferences::MatchPredicates,
    scoring::draft_suggestion,
};
use crate::{
    db::{Cache, EntityStore},
    error::{AppError, AppResult},
    models::{MovieSummary, Relevance, Suggestion, SuggestionDraft, SuggestionStatus},
};

/// Result of one generation request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub user_id: Uuid,
    pub cold_start: bool,
    pub candidates: usize,
    /// Suggestions actually written; pairs written concurrently by another
    /// request are not counted
    pub written: u64,
}

/// Runs the suggestion pipeline for one user
///
/// Matches the user's preferences, selects candidates, scores them behind the
/// age gate and writes the survivors in one bulk insert. The insert is the
/// only write.
pub async fn generate_suggestions(
    store: &dyn EntityStore,
    user_id: Uuid,
    cold_start_sample_size: usize,
) -> AppResult<GenerationOutcome> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    let predicates = MatchPredicates::from_preferences(&user.preferences);
    let candidates =
        select_candidates(store, user.id, &predicates, cold_start_sample_size).await?;

    let age = user.age();
    let drafts: Vec<SuggestionDraft> = candidates
        .movies
        .iter()
        .filter_map(|movie| {
            let draft = draft_suggestion(user.id, movie, age, &predicates);
            if draft.is_none() {
                tracing::debug!(movie_id = %movie.id, age, "Candidate rejected by age restriction");
            }
            draft
        })
        .collect();

    let written = write_suggestions(store, drafts, Utc::now()).await?;

    tracing::info!(
        user_id = %user.id,
        candidates = candidates.movies.len(),
        written,
        "Suggestions generated"
    );

    Ok(GenerationOutcome {
        user_id: user.id,
        cold_start: candidates.source == CandidateSource::ColdStart,
        candidates: candidates.movies.len(),
        written,
    })
}

/// Persists drafts with one bulk insert; no write at all for an empty batch
pub async fn write_suggestions(
    store: &dyn EntityStore,
    drafts: Vec<SuggestionDraft>,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    if drafts.is_empty() {
        return Ok(0);
    }

    let suggestions: Vec<Suggestion> = drafts
        .into_iter()
        .map(|draft| draft.into_suggestion(now))
        .collect();

    store
        .insert_suggestions(&suggestions)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, count = suggestions.len(), "Bulk suggestion insert failed");
            e
        })
}

/// A suggestion with its movie expanded to a summary
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionView {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "movieId")]
    pub movie: Option<MovieSummary>,
    pub suggested_because: String,
    pub relevance: Relevance,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl SuggestionView {
    fn new(suggestion: Suggestion, movie: Option<MovieSummary>) -> Self {
        Self {
            id: suggestion.id,
            user_id: suggestion.user_id,
            movie,
            suggested_because: suggestion.suggested_because,
            relevance: suggestion.relevance,
            status: suggestion.status,
            created_at: suggestion.created_at,
            last_modified: suggestion.last_modified,
        }
    }
}

/// Lists a user's suggestions with their movies expanded
pub async fn list_for_user(
    store: &dyn EntityStore,
    cache: Option<&Cache>,
    ttl: u64,
    user_id: Uuid,
) -> AppResult<Vec<SuggestionView>> {
    if store.find_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found.".to_string()));
    }

    let suggestions = store.suggestions_for_user(user_id).await?;
    let movie_ids: Vec<Uuid> = suggestions.iter().map(|s| s.movie_id).collect();
    let movies = load_movies(store, cache, ttl, &movie_ids).await?;

    Ok(suggestions
        .into_iter()
        .map(|suggestion| {
            let movie = movies.get(&suggestion.movie_id).map(MovieSummary::from);
            SuggestionView::new(suggestion, movie)
        })
        .collect())
}

/// Applies a user's response to a suggestion
///
/// Only an unanswered suggestion can be accepted or dismissed; re-applying the
/// current status is a no-op.
pub async fn update_status(
    store: &dyn EntityStore,
    id: Uuid,
    status: SuggestionStatus,
) -> AppResult<Suggestion> {
    let current = store
        .find_suggestion(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Suggestion not found.".to_string()))?;

    if current.status == status {
        return Ok(current);
    }
    if !current.status.can_transition_to(status) {
        return Err(AppError::InvalidInput(format!(
            "A suggestion that is {} cannot become {}.",
            current.status, status
        )));
    }

    store
        .update_suggestion_status(id, status, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("Suggestion not found.".to_string()))
}
