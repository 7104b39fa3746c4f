use uuid::Uuid;

use super::preferences::MatchPredicates;
use crate::models::{Movie, PreferenceDimension, Relevance, SuggestionDraft, SuggestionStatus};

/// Score of one candidate plus the movie values that earned it
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceScore {
    pub score: u32,
    /// Matched movie values in their original casing, then the rating if the
    /// floor was met
    pub matched: Vec<String>,
}

impl RelevanceScore {
    pub fn tier(&self) -> Relevance {
        Relevance::from_score(self.score)
    }

    pub fn explanation(&self) -> String {
        if self.matched.is_empty() {
            "Suggested randomly".to_string()
        } else {
            format!(
                "Suggested because your preferences contain: {}",
                self.matched.join(", ")
            )
        }
    }
}

/// Scores a movie for a user of `user_age`
///
/// Returns `None` when the movie's age restriction exceeds the user's age.
pub fn score_movie(
    movie: &Movie,
    user_age: u32,
    predicates: &MatchPredicates,
) -> Option<RelevanceScore> {
    if i64::from(movie.minimum_age()) > i64::from(user_age) {
        return None;
    }

    let mut score = 0;
    let mut matched = Vec::new();

    for dimension in PreferenceDimension::ALL {
        let set = predicates.set(dimension);
        for value in dimension.values(movie) {
            if set.contains(value) {
                score += 1;
                matched.push(value.clone());
            }
        }
    }

    if let (Some(floor), Some(rating)) = (predicates.min_rating, movie.rating) {
        if rating >= floor {
            score += 1;
            // f64 Display drops a trailing ".0"
            matched.push(rating.to_string());
        }
    }

    Some(RelevanceScore { score, matched })
}

/// Scores a candidate into an unsaved suggestion, or `None` if age-gated
pub fn draft_suggestion(
    user_id: Uuid,
    movie: &Movie,
    user_age: u32,
    predicates: &MatchPredicates,
) -> Option<SuggestionDraft> {
    let score = score_movie(movie, user_age, predicates)?;
    Some(SuggestionDraft {
        user_id,
        movie_id: movie.id,
        suggested_because: score.explanation(),
        relevance: score.tier(),
        status: SuggestionStatus::NoResponse,
    })
}
