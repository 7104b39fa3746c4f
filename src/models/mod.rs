mod movie;
mod person;
mod preferences;
mod review;
mod suggestion;
mod user;

pub use movie::{ContentAdvisory, Movie, MovieChanges, MovieSummary, NewMovie};
pub use person::{Award, NewPerson, Person, PersonChanges, PersonKind};
pub use preferences::{PreferenceDimension, Preferences};
pub use review::{validate_review_fields, NewReview, Review, ReviewStatus};
pub use suggestion::{Relevance, Suggestion, SuggestionDraft, SuggestionStatus};
pub use user::{NewUser, ProfileChanges, User, MINIMUM_SIGNUP_AGE};

/// Returned when a stored enum label does not name a known variant
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
