//! Referential integrity
//!
//! Deleting a user, movie, actor or director also removes or rewrites every
//! record that points at it. Each deletion runs as one store transaction: the
//! entity is looked up and locked inside it, dependents are cleaned up, the
//! entity row goes last, and any failure rolls the whole unit back.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{EntityStore, Reference, StoreTransaction},
    error::{AppError, AppResult},
    models::{Movie, Person, PersonKind, User},
};

/// Records touched by a cascade
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub actors_updated: u64,
    pub directors_updated: u64,
    pub movies_updated: u64,
    pub reviews_deleted: u64,
    pub suggestions_deleted: u64,
}

/// A deleted entity together with its cascade report
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deleted<T> {
    pub deleted: T,
    pub cascade: CascadeReport,
}

/// Deletes a movie, its reviews and suggestions, and its credits on people
pub async fn delete_movie(store: &dyn EntityStore, id: Uuid) -> AppResult<Deleted<Movie>> {
    let mut tx = store.begin().await?;
    let result = movie_cascade(tx.as_mut(), id).await;
    let deleted = finish(tx, result).await?;

    tracing::info!(
        movie_id = %id,
        reviews = deleted.cascade.reviews_deleted,
        suggestions = deleted.cascade.suggestions_deleted,
        "Movie deleted"
    );
    Ok(deleted)
}

/// Deletes a user with their reviews and suggestions
pub async fn delete_user(store: &dyn EntityStore, id: Uuid) -> AppResult<Deleted<User>> {
    let mut tx = store.begin().await?;
    let result = user_cascade(tx.as_mut(), id).await;
    let deleted = finish(tx, result).await?;

    tracing::info!(
        user_id = %id,
        reviews = deleted.cascade.reviews_deleted,
        suggestions = deleted.cascade.suggestions_deleted,
        "User deleted"
    );
    Ok(deleted)
}

/// Deletes an actor or director and removes them from every movie's credits
pub async fn delete_person(
    store: &dyn EntityStore,
    kind: PersonKind,
    id: Uuid,
) -> AppResult<Deleted<Person>> {
    let mut tx = store.begin().await?;
    let result = person_cascade(tx.as_mut(), kind, id).await;
    let deleted = finish(tx, result).await?;

    tracing::info!(
        kind = %kind,
        person_id = %id,
        movies = deleted.cascade.movies_updated,
        "Person deleted"
    );
    Ok(deleted)
}

async fn movie_cascade(tx: &mut dyn StoreTransaction, id: Uuid) -> AppResult<Deleted<Movie>> {
    let movie = tx
        .lock_movie(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found.".to_string()))?;

    let cascade = CascadeReport {
        actors_updated: tx.pull_movie_from_people(PersonKind::Actor, id).await?,
        directors_updated: tx.pull_movie_from_people(PersonKind::Director, id).await?,
        reviews_deleted: tx.delete_reviews(Reference::Movie(id)).await?,
        suggestions_deleted: tx.delete_suggestions(Reference::Movie(id)).await?,
        ..Default::default()
    };
    tx.delete_movie(id).await?;

    Ok(Deleted {
        deleted: movie,
        cascade,
    })
}

async fn user_cascade(tx: &mut dyn StoreTransaction, id: Uuid) -> AppResult<Deleted<User>> {
    let user = tx
        .lock_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    let cascade = CascadeReport {
        reviews_deleted: tx.delete_reviews(Reference::User(id)).await?,
        suggestions_deleted: tx.delete_suggestions(Reference::User(id)).await?,
        ..Default::default()
    };
    tx.delete_user(id).await?;

    Ok(Deleted {
        deleted: user,
        cascade,
    })
}

async fn person_cascade(
    tx: &mut dyn StoreTransaction,
    kind: PersonKind,
    id: Uuid,
) -> AppResult<Deleted<Person>> {
    let person = tx
        .lock_person(kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found.", kind)))?;

    let cascade = CascadeReport {
        movies_updated: tx.pull_person_from_movies(kind, id).await?,
        ..Default::default()
    };
    tx.delete_person(kind, id).await?;

    Ok(Deleted {
        deleted: person,
        cascade,
    })
}

/// Commits on success, rolls back and returns the original error otherwise
async fn finish<T>(tx: Box<dyn StoreTransaction>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "Rollback failed after cascade error");
            }
            Err(e)
        }
    }
}
