use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Active,
    Deleted,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Active => "active",
            ReviewStatus::Deleted => "deleted",
        }
    }
}

impl Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReviewStatus::Active),
            "deleted" => Ok(ReviewStatus::Deleted),
            other => Err(UnknownVariant::new("review status", other)),
        }
    }
}

/// A user's review of a movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    /// Whole number between 1 and 10
    pub rating: i32,
    pub comment: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

const MAX_COMMENT_CHARS: usize = 300;

/// Checks the rating and comment rules shared by create and update
pub fn validate_review_fields(rating: i32, comment: Option<&str>) -> Result<(), String> {
    if !(1..=10).contains(&rating) {
        return Err("Rating should be a full number between 1 to 10.".to_string());
    }
    if comment.is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS) {
        return Err(format!(
            "Comment must be at most {} characters long.",
            MAX_COMMENT_CHARS
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewReview {
    pub fn into_review(self, now: DateTime<Utc>) -> Result<Review, String> {
        validate_review_fields(self.rating, self.comment.as_deref())?;
        Ok(Review {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            movie_id: self.movie_id,
            rating: self.rating,
            comment: self.comment,
            status: ReviewStatus::Active,
            created_at: now,
            last_modified: now,
        })
    }
}
