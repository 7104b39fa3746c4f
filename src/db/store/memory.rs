use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use super::{EntityStore, MovieFilter, MovieTermQuery, Reference, StoreTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{Movie, Person, PersonKind, Preferences, Review, Suggestion, SuggestionStatus, User},
};

/// Store operations that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    PullFromPeople,
    PullFromMovies,
    DeleteReviews,
    DeleteSuggestions,
    DeleteEntity,
    Commit,
    InsertSuggestions,
}

#[derive(Debug, Clone, Default)]
struct Collections {
    users: BTreeMap<Uuid, User>,
    movies: BTreeMap<Uuid, Movie>,
    actors: BTreeMap<Uuid, Person>,
    directors: BTreeMap<Uuid, Person>,
    reviews: BTreeMap<Uuid, Review>,
    suggestions: BTreeMap<Uuid, Suggestion>,
}

impl Collections {
    fn people(&self, kind: PersonKind) -> &BTreeMap<Uuid, Person> {
        match kind {
            PersonKind::Actor => &self.actors,
            PersonKind::Director => &self.directors,
        }
    }

    fn people_mut(&mut self, kind: PersonKind) -> &mut BTreeMap<Uuid, Person> {
        match kind {
            PersonKind::Actor => &mut self.actors,
            PersonKind::Director => &mut self.directors,
        }
    }
}

type FailPoints = Arc<Mutex<HashSet<FailPoint>>>;

fn check(fail_points: &FailPoints, point: FailPoint) -> AppResult<()> {
    let armed = fail_points
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains(&point);
    if armed {
        return Err(AppError::Database(sqlx::Error::Protocol(format!(
            "injected failure at {:?}",
            point
        ))));
    }
    Ok(())
}

fn sorted_by_title(mut movies: Vec<Movie>) -> Vec<Movie> {
    movies.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
    movies
}

fn sorted_by_name(mut people: Vec<Person>) -> Vec<Person> {
    people.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    people
}

/// In-process entity store
///
/// All collections sit behind one `RwLock`. A transaction takes the write
/// lock, mutates a private copy and swaps it in on commit, so readers never
/// observe a partially applied unit of work.
#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    data: Arc<RwLock<Collections>>,
    fail_points: FailPoints,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call reaching `point` fail with a store error
    pub fn fail_on(&self, point: FailPoint) {
        self.fail_points
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(point);
    }

    pub fn clear_failures(&self) {
        self.fail_points
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryEntityStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut data = self.data.write().await;
        if data.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "{} is already registered.",
                user.email
            )));
        }
        data.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.data.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.data.read().await.users.values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        preferences: &Preferences,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let mut data = self.data.write().await;
        Ok(data.users.get_mut(&id).map(|user| {
            user.preferences = preferences.clone();
            user.last_modified = now;
            user.clone()
        }))
    }

    async fn update_user(&self, user: &User) -> AppResult<bool> {
        let mut data = self.data.write().await;
        let Some(existing) = data.users.get_mut(&user.id) else {
            return Ok(false);
        };
        existing.name = user.name.clone();
        existing.bio = user.bio.clone();
        existing.birthdate = user.birthdate;
        existing.last_modified = user.last_modified;
        Ok(true)
    }

    async fn insert_movie(&self, movie: &Movie) -> AppResult<()> {
        let mut data = self.data.write().await;
        for kind in [PersonKind::Actor, PersonKind::Director] {
            for person_id in movie.credits(kind) {
                if let Some(person) = data.people_mut(kind).get_mut(person_id) {
                    if !person.movies.contains(&movie.id) {
                        person.movies.push(movie.id);
                    }
                }
            }
        }
        data.movies.insert(movie.id, movie.clone());
        Ok(())
    }

    async fn find_movie(&self, id: Uuid) -> AppResult<Option<Movie>> {
        Ok(self.data.read().await.movies.get(&id).cloned())
    }

    async fn find_movies(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>> {
        let data = self.data.read().await;
        Ok(ids.iter().filter_map(|id| data.movies.get(id).cloned()).collect())
    }

    async fn list_movies(&self, filter: &MovieFilter) -> AppResult<Vec<Movie>> {
        let data = self.data.read().await;
        let advisory = filter.advisory;
        let movies = data
            .movies
            .values()
            .filter(|m| {
                filter.genres.is_empty() || m.genres.iter().any(|g| filter.genres.contains(g))
            })
            .filter(|m| !advisory.violence || m.content_advisory.violence)
            .filter(|m| !advisory.vulgar_language || m.content_advisory.vulgar_language)
            .filter(|m| !advisory.sexual_content || m.content_advisory.sexual_content)
            .filter(|m| !advisory.drug_use || m.content_advisory.drug_use)
            .cloned()
            .collect();
        Ok(sorted_by_title(movies))
    }

    async fn search_movies(&self, title: &str) -> AppResult<Vec<Movie>> {
        let needle = title.to_lowercase();
        let data = self.data.read().await;
        let movies = data
            .movies
            .values()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(sorted_by_title(movies))
    }

    async fn update_movie(&self, movie: &Movie) -> AppResult<bool> {
        let mut data = self.data.write().await;
        let Some(existing) = data.movies.get_mut(&movie.id) else {
            return Ok(false);
        };
        let mut updated = movie.clone();
        updated.actors = std::mem::take(&mut existing.actors);
        updated.directors = std::mem::take(&mut existing.directors);
        updated.created_at = existing.created_at;
        *existing = updated;
        Ok(true)
    }

    async fn find_movies_by_terms(&self, query: &MovieTermQuery) -> AppResult<Vec<Movie>> {
        let data = self.data.read().await;
        let movies = data
            .movies
            .values()
            .filter(|m| query.admits(m))
            .cloned()
            .collect();
        Ok(sorted_by_title(movies))
    }

    async fn sample_movies(&self, size: usize) -> AppResult<Vec<Movie>> {
        let movies: Vec<Movie> = self.data.read().await.movies.values().cloned().collect();
        let sample = movies
            .choose_multiple(&mut rand::thread_rng(), size)
            .cloned()
            .collect();
        Ok(sample)
    }

    async fn insert_person(&self, kind: PersonKind, person: &Person) -> AppResult<()> {
        let mut data = self.data.write().await;
        for movie_id in &person.movies {
            if let Some(movie) = data.movies.get_mut(movie_id) {
                let credits = movie.credits_mut(kind);
                if !credits.contains(&person.id) {
                    credits.push(person.id);
                }
            }
        }
        data.people_mut(kind).insert(person.id, person.clone());
        Ok(())
    }

    async fn find_person(&self, kind: PersonKind, id: Uuid) -> AppResult<Option<Person>> {
        Ok(self.data.read().await.people(kind).get(&id).cloned())
    }

    async fn find_people(&self, kind: PersonKind, ids: &[Uuid]) -> AppResult<Vec<Person>> {
        let data = self.data.read().await;
        let people = data.people(kind);
        Ok(ids.iter().filter_map(|id| people.get(id).cloned()).collect())
    }

    async fn list_people(&self, kind: PersonKind) -> AppResult<Vec<Person>> {
        let people = self.data.read().await.people(kind).values().cloned().collect();
        Ok(sorted_by_name(people))
    }

    async fn update_person(&self, kind: PersonKind, person: &Person) -> AppResult<bool> {
        let mut data = self.data.write().await;
        let Some(existing) = data.people_mut(kind).get_mut(&person.id) else {
            return Ok(false);
        };
        let mut updated = person.clone();
        updated.movies = std::mem::take(&mut existing.movies);
        updated.created_at = existing.created_at;
        *existing = updated;
        Ok(true)
    }

    async fn search_people(&self, kind: PersonKind, name: &str) -> AppResult<Vec<Person>> {
        let needle = name.to_lowercase();
        let data = self.data.read().await;
        let people = data
            .people(kind)
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(sorted_by_name(people))
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&review.user_id) {
            return Err(AppError::NotFound("User not found.".to_string()));
        }
        if !data.movies.contains_key(&review.movie_id) {
            return Err(AppError::NotFound("Movie not found.".to_string()));
        }
        data.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        Ok(self.data.read().await.reviews.get(&id).cloned())
    }

    async fn list_reviews(&self) -> AppResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self.data.read().await.reviews.values().cloned().collect();
        reviews.sort_by_key(|r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn reviews_for(&self, reference: Reference) -> AppResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .data
            .read()
            .await
            .reviews
            .values()
            .filter(|r| reference.owns(r.user_id, r.movie_id))
            .cloned()
            .collect();
        reviews.sort_by_key(|r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn update_review(&self, review: &Review) -> AppResult<bool> {
        let mut data = self.data.write().await;
        match data.reviews.get_mut(&review.id) {
            Some(existing) => {
                *existing = review.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        Ok(self.data.write().await.reviews.remove(&id))
    }

    async fn suggestions_for_user(&self, user_id: Uuid) -> AppResult<Vec<Suggestion>> {
        let mut suggestions: Vec<Suggestion> = self
            .data
            .read()
            .await
            .suggestions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        suggestions.sort_by_key(|s| (s.created_at, s.id));
        Ok(suggestions)
    }

    async fn suggested_movie_ids(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        Ok(self
            .data
            .read()
            .await
            .suggestions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.movie_id)
            .collect())
    }

    async fn find_suggestion(&self, id: Uuid) -> AppResult<Option<Suggestion>> {
        Ok(self.data.read().await.suggestions.get(&id).cloned())
    }

    async fn insert_suggestions(&self, suggestions: &[Suggestion]) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::InsertSuggestions)?;
        let mut data = self.data.write().await;
        let mut taken: HashSet<(Uuid, Uuid)> = data
            .suggestions
            .values()
            .map(|s| (s.user_id, s.movie_id))
            .collect();

        let mut written = 0;
        for suggestion in suggestions {
            let referenced = data.users.contains_key(&suggestion.user_id)
                && data.movies.contains_key(&suggestion.movie_id);
            if referenced && taken.insert((suggestion.user_id, suggestion.movie_id)) {
                data.suggestions.insert(suggestion.id, suggestion.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn update_suggestion_status(
        &self,
        id: Uuid,
        status: SuggestionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Suggestion>> {
        let mut data = self.data.write().await;
        Ok(data.suggestions.get_mut(&id).map(|suggestion| {
            suggestion.status = status;
            suggestion.last_modified = now;
            suggestion.clone()
        }))
    }

    async fn delete_suggestion(&self, id: Uuid) -> AppResult<Option<Suggestion>> {
        Ok(self.data.write().await.suggestions.remove(&id))
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        check(&self.fail_points, FailPoint::Begin)?;
        let guard = self.data.clone().write_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            fail_points: self.fail_points.clone(),
        }))
    }
}

/// Transaction over a private copy of the collections
pub struct MemoryTransaction {
    guard: OwnedRwLockWriteGuard<Collections>,
    working: Collections,
    fail_points: FailPoints,
}

#[async_trait::async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_movie(&mut self, id: Uuid) -> AppResult<Option<Movie>> {
        Ok(self.working.movies.get(&id).cloned())
    }

    async fn lock_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn lock_person(&mut self, kind: PersonKind, id: Uuid) -> AppResult<Option<Person>> {
        Ok(self.working.people(kind).get(&id).cloned())
    }

    async fn pull_movie_from_people(
        &mut self,
        kind: PersonKind,
        movie_id: Uuid,
    ) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::PullFromPeople)?;
        let mut updated = 0;
        for person in self.working.people_mut(kind).values_mut() {
            if person.movies.contains(&movie_id) {
                person.movies.retain(|id| *id != movie_id);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn pull_person_from_movies(
        &mut self,
        kind: PersonKind,
        person_id: Uuid,
    ) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::PullFromMovies)?;
        let mut updated = 0;
        for movie in self.working.movies.values_mut() {
            let credits = movie.credits_mut(kind);
            if credits.contains(&person_id) {
                credits.retain(|id| *id != person_id);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_reviews(&mut self, reference: Reference) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::DeleteReviews)?;
        let before = self.working.reviews.len();
        self.working
            .reviews
            .retain(|_, r| !reference.owns(r.user_id, r.movie_id));
        Ok((before - self.working.reviews.len()) as u64)
    }

    async fn delete_suggestions(&mut self, reference: Reference) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::DeleteSuggestions)?;
        let before = self.working.suggestions.len();
        self.working
            .suggestions
            .retain(|_, s| !reference.owns(s.user_id, s.movie_id));
        Ok((before - self.working.suggestions.len()) as u64)
    }

    async fn delete_movie(&mut self, id: Uuid) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::DeleteEntity)?;
        Ok(self.working.movies.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_user(&mut self, id: Uuid) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::DeleteEntity)?;
        Ok(self.working.users.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_person(&mut self, kind: PersonKind, id: Uuid) -> AppResult<u64> {
        check(&self.fail_points, FailPoint::DeleteEntity)?;
        Ok(self.working.people_mut(kind).remove(&id).map_or(0, |_| 1))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        check(&self.fail_points, FailPoint::Commit)?;
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        // The working copy is discarded with the guard
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMovie, NewPerson, NewReview, NewUser, Relevance};

    fn movie(title: &str) -> Movie {
        NewMovie {
            title: title.to_string(),
            ..Default::default()
        }
        .into_movie(Utc::now())
    }

    fn suggestion(user_id: Uuid, movie_id: Uuid) -> Suggestion {
        Suggestion {
            id: Uuid::new_v4(),
            user_id,
            movie_id,
            suggested_because: "Suggested randomly".to_string(),
            relevance: Relevance::Minimally,
            status: SuggestionStatus::NoResponse,
            created_at: Utc::now(),
            last_modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_movie_links_people() {
        let store = MemoryEntityStore::new();
        let actor = NewPerson {
            name: "Toni Servillo".to_string(),
            birthdate: chrono::NaiveDate::from_ymd_opt(1959, 1, 25),
            ..Default::default()
        }
        .into_person(PersonKind::Actor, Utc::now())
        .unwrap();
        store.insert_person(PersonKind::Actor, &actor).await.unwrap();

        let mut film = movie("La Grande Bellezza");
        film.actors = vec![actor.id];
        store.insert_movie(&film).await.unwrap();

        let actor = store.find_person(PersonKind::Actor, actor.id).await.unwrap().unwrap();
        assert_eq!(actor.movies, vec![film.id]);
    }

    fn user(email: &str) -> User {
        NewUser {
            name: "Member".to_string(),
            email: email.to_string(),
            bio: None,
            birthdate: chrono::NaiveDate::from_ymd_opt(1985, 7, 1),
            preferences: Preferences::default(),
            is_admin: false,
        }
        .into_user(Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_suggestions_skips_existing_pairs() {
        let store = MemoryEntityStore::new();
        let member = user("member@example.com");
        store.insert_user(&member).await.unwrap();
        let first_movie = movie("Ikiru");
        let second_movie = movie("Ran");
        store.insert_movie(&first_movie).await.unwrap();
        store.insert_movie(&second_movie).await.unwrap();

        let first = store
            .insert_suggestions(&[suggestion(member.id, first_movie.id)])
            .await
            .unwrap();
        let second = store
            .insert_suggestions(&[
                suggestion(member.id, first_movie.id),
                suggestion(member.id, second_movie.id),
            ])
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(store.suggested_movie_ids(member.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_suggestions_skips_missing_references() {
        let store = MemoryEntityStore::new();
        let member = user("member@example.com");
        store.insert_user(&member).await.unwrap();
        let kept = movie("Yojimbo");
        store.insert_movie(&kept).await.unwrap();

        let written = store
            .insert_suggestions(&[
                suggestion(member.id, kept.id),
                suggestion(member.id, Uuid::new_v4()),
                suggestion(Uuid::new_v4(), kept.id),
            ])
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(
            store.suggested_movie_ids(member.id).await.unwrap(),
            HashSet::from([kept.id])
        );
    }

    #[tokio::test]
    async fn test_insert_review_requires_user_and_movie() {
        let store = MemoryEntityStore::new();
        let member = user("member@example.com");
        store.insert_user(&member).await.unwrap();
        let film = movie("Sanjuro");
        store.insert_movie(&film).await.unwrap();

        let review = |user_id, movie_id| {
            NewReview {
                user_id,
                movie_id,
                rating: 9,
                comment: None,
            }
            .into_review(Utc::now())
            .unwrap()
        };

        let err = store
            .insert_review(&review(member.id, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == "Movie not found."));
        let err = store
            .insert_review(&review(Uuid::new_v4(), film.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == "User not found."));
        assert!(store.list_reviews().await.unwrap().is_empty());

        store.insert_review(&review(member.id, film.id)).await.unwrap();
        assert_eq!(store.list_reviews().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_movie_keeps_credits() {
        let store = MemoryEntityStore::new();
        let actor = NewPerson {
            name: "Toshiro Mifune".to_string(),
            birthdate: chrono::NaiveDate::from_ymd_opt(1920, 4, 1),
            ..Default::default()
        }
        .into_person(PersonKind::Actor, Utc::now())
        .unwrap();
        store.insert_person(PersonKind::Actor, &actor).await.unwrap();
        let mut film = movie("Rashomon");
        film.actors = vec![actor.id];
        store.insert_movie(&film).await.unwrap();

        let mut edited = film.clone();
        edited.plot = Some("Four accounts of one crime.".to_string());
        edited.actors = Vec::new();
        assert!(store.update_movie(&edited).await.unwrap());

        let stored = store.find_movie(film.id).await.unwrap().unwrap();
        assert_eq!(stored.plot, edited.plot);
        assert_eq!(stored.actors, vec![actor.id]);
        assert!(!store.update_movie(&movie("Missing")).await.unwrap());
    }

    #[tokio::test]
    async fn test_sample_is_bounded_and_distinct() {
        let store = MemoryEntityStore::new();
        for i in 0..30 {
            store.insert_movie(&movie(&format!("Movie {}", i))).await.unwrap();
        }
        let sample = store.sample_movies(20).await.unwrap();
        let ids: HashSet<Uuid> = sample.iter().map(|m| m.id).collect();
        assert_eq!(sample.len(), 20);
        assert_eq!(ids.len(), 20);

        let small = MemoryEntityStore::new();
        small.insert_movie(&movie("Only")).await.unwrap();
        assert_eq!(small.sample_movies(20).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_discarded() {
        let store = MemoryEntityStore::new();
        let film = movie("Stalker");
        store.insert_movie(&film).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            assert_eq!(tx.delete_movie(film.id).await.unwrap(), 1);
            tx.rollback().await.unwrap();
        }
        assert!(store.find_movie(film.id).await.unwrap().is_some());

        let mut tx = store.begin().await.unwrap();
        tx.delete_movie(film.id).await.unwrap();
        tx.commit().await.unwrap();
        assert!(store.find_movie(film.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_point_returns_store_error() {
        let store = MemoryEntityStore::new();
        store.fail_on(FailPoint::InsertSuggestions);
        let err = store
            .insert_suggestions(&[suggestion(Uuid::new_v4(), Uuid::new_v4())])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        store.clear_failures();
        assert!(store.insert_suggestions(&[]).await.is_ok());
    }
}
