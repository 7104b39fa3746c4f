//! Entity store abstraction
//!
//! The catalog collections (users, movies, actors, directors, reviews and
//! suggestions) live behind [`EntityStore`] so the suggestion pipeline and the
//! referential integrity manager can run against Postgres in production and
//! against an in-memory store in tests.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        ContentAdvisory, Movie, Person, PersonKind, PreferenceDimension, Preferences, Review,
        Suggestion, SuggestionStatus, User,
    },
};

pub mod memory;
pub mod pg;

pub use memory::{FailPoint, MemoryEntityStore};
pub use pg::PgEntityStore;

/// The owning side of a review or suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    User(Uuid),
    Movie(Uuid),
}

impl Reference {
    /// Whether a record pointing at `user_id` and `movie_id` belongs to this owner
    pub fn owns(&self, user_id: Uuid, movie_id: Uuid) -> bool {
        match self {
            Reference::User(id) => *id == user_id,
            Reference::Movie(id) => *id == movie_id,
        }
    }
}

/// Filters for listing movies
///
/// `genres` matches exact genre labels (any of them). Every advisory flag set
/// to `true` requires the movie to carry that flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieFilter {
    pub genres: Vec<String>,
    pub advisory: ContentAdvisory,
}

/// Coarse substring terms for the preference query
///
/// A movie qualifies when, for at least one dimension, one of its values
/// contains one of that dimension's terms (case-insensitive). Stores may return
/// a superset; exact token matching happens in the candidate selector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieTermQuery {
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub languages: Vec<String>,
    pub countries_of_origin: Vec<String>,
}

impl MovieTermQuery {
    pub fn terms(&self, dimension: PreferenceDimension) -> &[String] {
        match dimension {
            PreferenceDimension::Genres => &self.genres,
            PreferenceDimension::Themes => &self.themes,
            PreferenceDimension::Languages => &self.languages,
            PreferenceDimension::CountriesOfOrigin => &self.countries_of_origin,
        }
    }

    pub fn terms_mut(&mut self, dimension: PreferenceDimension) -> &mut Vec<String> {
        match dimension {
            PreferenceDimension::Genres => &mut self.genres,
            PreferenceDimension::Themes => &mut self.themes,
            PreferenceDimension::Languages => &mut self.languages,
            PreferenceDimension::CountriesOfOrigin => &mut self.countries_of_origin,
        }
    }

    pub fn is_empty(&self) -> bool {
        PreferenceDimension::ALL
            .iter()
            .all(|d| self.terms(*d).is_empty())
    }

    /// Whether a movie satisfies the coarse substring test
    pub fn admits(&self, movie: &Movie) -> bool {
        PreferenceDimension::ALL.iter().any(|dimension| {
            let terms = self.terms(*dimension);
            dimension.values(movie).iter().any(|value| {
                let value = value.to_lowercase();
                terms.iter().any(|term| value.contains(term.as_str()))
            })
        })
    }
}

/// Persistent catalog collections
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    // Users

    /// Fails with a conflict when the email is already registered
    async fn insert_user(&self, user: &User) -> AppResult<()>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn update_preferences(
        &self,
        id: Uuid,
        preferences: &Preferences,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>>;
    /// Writes name, bio, birthdate and `last_modified`. Returns `false` when
    /// the user no longer exists.
    async fn update_user(&self, user: &User) -> AppResult<bool>;

    // Movies

    /// Inserts the movie and appends its id to the `movies` list of every
    /// actor and director it references, atomically
    async fn insert_movie(&self, movie: &Movie) -> AppResult<()>;
    async fn find_movie(&self, id: Uuid) -> AppResult<Option<Movie>>;
    async fn find_movies(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>>;
    async fn list_movies(&self, filter: &MovieFilter) -> AppResult<Vec<Movie>>;
    /// Case-insensitive title substring search
    async fn search_movies(&self, title: &str) -> AppResult<Vec<Movie>>;
    /// Writes every field except the credit lists and `created_at`. Returns
    /// `false` when the movie no longer exists.
    async fn update_movie(&self, movie: &Movie) -> AppResult<bool>;
    async fn find_movies_by_terms(&self, query: &MovieTermQuery) -> AppResult<Vec<Movie>>;
    /// Uniformly random sample of at most `size` movies
    async fn sample_movies(&self, size: usize) -> AppResult<Vec<Movie>>;

    // Actors and directors

    /// Inserts the person and appends its id to the matching credit list of
    /// every movie it references, atomically
    async fn insert_person(&self, kind: PersonKind, person: &Person) -> AppResult<()>;
    async fn find_person(&self, kind: PersonKind, id: Uuid) -> AppResult<Option<Person>>;
    async fn find_people(&self, kind: PersonKind, ids: &[Uuid]) -> AppResult<Vec<Person>>;
    async fn list_people(&self, kind: PersonKind) -> AppResult<Vec<Person>>;
    /// Writes every field except `movies` and `created_at`. Returns `false`
    /// when the person no longer exists.
    async fn update_person(&self, kind: PersonKind, person: &Person) -> AppResult<bool>;
    /// Case-insensitive name substring search
    async fn search_people(&self, kind: PersonKind, name: &str) -> AppResult<Vec<Person>>;

    // Reviews

    /// Fails with not-found when the user or the movie no longer exists
    async fn insert_review(&self, review: &Review) -> AppResult<()>;
    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>>;
    async fn list_reviews(&self) -> AppResult<Vec<Review>>;
    async fn reviews_for(&self, reference: Reference) -> AppResult<Vec<Review>>;
    /// Returns `false` when the review no longer exists
    async fn update_review(&self, review: &Review) -> AppResult<bool>;
    async fn delete_review(&self, id: Uuid) -> AppResult<Option<Review>>;

    // Suggestions

    async fn suggestions_for_user(&self, user_id: Uuid) -> AppResult<Vec<Suggestion>>;
    async fn suggested_movie_ids(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>>;
    async fn find_suggestion(&self, id: Uuid) -> AppResult<Option<Suggestion>>;
    /// Writes every suggestion in one statement, skipping (user, movie) pairs
    /// that already exist and rows whose user or movie no longer exists.
    /// Returns the number of rows written.
    async fn insert_suggestions(&self, suggestions: &[Suggestion]) -> AppResult<u64>;
    async fn update_suggestion_status(
        &self,
        id: Uuid,
        status: SuggestionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Suggestion>>;
    async fn delete_suggestion(&self, id: Uuid) -> AppResult<Option<Suggestion>>;

    /// Opens a transaction spanning every collection
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}

/// A unit of work across collections
///
/// Nothing done through the handle is visible to other readers until
/// [`StoreTransaction::commit`] succeeds. Dropping the handle without
/// committing discards every step.
#[async_trait::async_trait]
pub trait StoreTransaction: Send {
    /// Reads the movie and holds it against concurrent writers
    ///
    /// Implementations that lock rows take the credited actors and directors
    /// before the movie, the same order a person deletion uses.
    async fn lock_movie(&mut self, id: Uuid) -> AppResult<Option<Movie>>;
    async fn lock_user(&mut self, id: Uuid) -> AppResult<Option<User>>;
    async fn lock_person(&mut self, kind: PersonKind, id: Uuid) -> AppResult<Option<Person>>;

    /// Removes the movie id from the `movies` list of every person of `kind`
    async fn pull_movie_from_people(&mut self, kind: PersonKind, movie_id: Uuid)
        -> AppResult<u64>;
    /// Removes the person id from the matching credit list of every movie
    async fn pull_person_from_movies(&mut self, kind: PersonKind, person_id: Uuid)
        -> AppResult<u64>;

    async fn delete_reviews(&mut self, reference: Reference) -> AppResult<u64>;
    async fn delete_suggestions(&mut self, reference: Reference) -> AppResult<u64>;

    async fn delete_movie(&mut self, id: Uuid) -> AppResult<u64>;
    async fn delete_user(&mut self, id: Uuid) -> AppResult<u64>;
    async fn delete_person(&mut self, kind: PersonKind, id: Uuid) -> AppResult<u64>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}
