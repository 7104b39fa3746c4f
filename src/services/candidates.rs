use std::collections::HashSet;

use uuid::Uuid;

use super::preferences::MatchPredicates;
use crate::{db::EntityStore, error::AppResult, models::Movie};

/// Movies drawn when a user has no usable preferences
pub const COLD_START_SAMPLE_SIZE: usize = 20;

/// Where a batch of candidates came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Preferences,
    ColdStart,
}

#[derive(Debug, Clone)]
pub struct Candidates {
    pub source: CandidateSource,
    pub movies: Vec<Movie>,
}

/// Selects movies to score for a user
///
/// With at least one non-empty predicate set, returns the movies matching any
/// phrase in any dimension. Otherwise draws a random sample of `sample_size`
/// movies. Movies already suggested to the user, and repeated ids, are
/// removed either way.
pub async fn select_candidates(
    store: &dyn EntityStore,
    user_id: Uuid,
    predicates: &MatchPredicates,
    sample_size: usize,
) -> AppResult<Candidates> {
    let (source, movies) = if predicates.is_empty() {
        (
            CandidateSource::ColdStart,
            store.sample_movies(sample_size).await?,
        )
    } else {
        let coarse = store.find_movies_by_terms(&predicates.term_query()).await?;
        let matched = coarse
            .into_iter()
            .filter(|movie| predicates.matches_movie(movie))
            .collect();
        (CandidateSource::Preferences, matched)
    };

    let already_suggested = store.suggested_movie_ids(user_id).await?;
    let fetched = movies.len();
    let mut seen = HashSet::new();
    let movies: Vec<Movie> = movies
        .into_iter()
        .filter(|movie| !already_suggested.contains(&movie.id) && seen.insert(movie.id))
        .collect();

    tracing::debug!(
        user_id = %user_id,
        source = ?source,
        fetched,
        kept = movies.len(),
        "Candidates selected"
    );

    Ok(Candidates { source, movies })
}
