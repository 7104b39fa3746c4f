use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use super::UnknownVariant;

/// Qualitative relevance tier, ordered from least to most relevant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relevance {
    #[serde(rename = "Minimally Relevant")]
    Minimally,
    #[serde(rename = "Slightly Relevant")]
    Slightly,
    #[serde(rename = "Moderately Relevant")]
    Moderately,
    #[serde(rename = "Very Relevant")]
    Very,
    #[serde(rename = "Highly Relevant")]
    Highly,
}

impl Relevance {
    /// Tier for a relevance score; the highest threshold the score exceeds wins
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s > 12 => Relevance::Highly,
            s if s > 9 => Relevance::Very,
            s if s > 6 => Relevance::Moderately,
            s if s > 3 => Relevance::Slightly,
            _ => Relevance::Minimally,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::Minimally => "Minimally Relevant",
            Relevance::Slightly => "Slightly Relevant",
            Relevance::Moderately => "Moderately Relevant",
            Relevance::Very => "Very Relevant",
            Relevance::Highly => "Highly Relevant",
        }
    }
}

impl Display for Relevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relevance {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Minimally Relevant" => Ok(Relevance::Minimally),
            "Slightly Relevant" => Ok(Relevance::Slightly),
            "Moderately Relevant" => Ok(Relevance::Moderately),
            "Very Relevant" => Ok(Relevance::Very),
            "Highly Relevant" => Ok(Relevance::Highly),
            other => Err(UnknownVariant::new("relevance", other)),
        }
    }
}

/// Workflow state of a suggestion
///
/// `NoResponse` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionStatus {
    #[default]
    NoResponse,
    Accepted,
    Dismissed,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::NoResponse => "no-response",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Dismissed => "dismissed",
        }
    }

    /// Whether a user action may move a suggestion from `self` to `next`
    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        matches!(
            (self, next),
            (SuggestionStatus::NoResponse, SuggestionStatus::Accepted)
                | (SuggestionStatus::NoResponse, SuggestionStatus::Dismissed)
        ) || *self == next
    }
}

impl Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-response" => Ok(SuggestionStatus::NoResponse),
            "accepted" => Ok(SuggestionStatus::Accepted),
            "dismissed" => Ok(SuggestionStatus::Dismissed),
            other => Err(UnknownVariant::new("suggestion status", other)),
        }
    }
}

/// A persisted movie suggestion for a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub suggested_because: String,
    pub relevance: Relevance,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A scored suggestion that has not been written yet
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionDraft {
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub suggested_because: String,
    pub relevance: Relevance,
    pub status: SuggestionStatus,
}

impl SuggestionDraft {
    pub fn into_suggestion(self, now: DateTime<Utc>) -> Suggestion {
        Suggestion {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            movie_id: self.movie_id,
            suggested_because: self.suggested_because,
            relevance: self.relevance,
            status: self.status,
            created_at: now,
            last_modified: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Relevance::from_score(0), Relevance::Minimally);
        assert_eq!(Relevance::from_score(3), Relevance::Minimally);
        assert_eq!(Relevance::from_score(4), Relevance::Slightly);
        assert_eq!(Relevance::from_score(6), Relevance::Slightly);
        assert_eq!(Relevance::from_score(7), Relevance::Moderately);
        assert_eq!(Relevance::from_score(10), Relevance::Very);
        assert_eq!(Relevance::from_score(12), Relevance::Very);
        assert_eq!(Relevance::from_score(13), Relevance::Highly);
    }

    #[test]
    fn test_tier_is_monotonic_in_score() {
        for s1 in 0..40u32 {
            for s2 in s1 + 1..40 {
                assert!(Relevance::from_score(s1) <= Relevance::from_score(s2));
            }
        }
    }

    #[test]
    fn test_relevance_serializes_as_label() {
        let json = serde_json::to_string(&Relevance::Moderately).unwrap();
        assert_eq!(json, "\"Moderately Relevant\"");
        assert_eq!(
            "Very Relevant".parse::<Relevance>().unwrap(),
            Relevance::Very
        );
    }

    #[test]
    fn test_status_transitions() {
        let open = SuggestionStatus::NoResponse;
        assert!(open.can_transition_to(SuggestionStatus::Accepted));
        assert!(open.can_transition_to(SuggestionStatus::Dismissed));
        assert!(!SuggestionStatus::Accepted.can_transition_to(SuggestionStatus::Dismissed));
        assert!(!SuggestionStatus::Dismissed.can_transition_to(SuggestionStatus::NoResponse));
        assert_eq!(
            serde_json::to_string(&SuggestionStatus::NoResponse).unwrap(),
            "\"no-response\""
        );
    }
}
