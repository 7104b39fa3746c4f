use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    cached,
    db::{Cache, CacheKey, EntityStore},
    error::{AppError, AppResult},
    models::Movie,
};

/// Looks a movie up through the cache
pub async fn get_movie(
    store: &dyn EntityStore,
    cache: Option<&Cache>,
    ttl: u64,
    id: Uuid,
) -> AppResult<Movie> {
    cached!(cache, CacheKey::Movie(id), ttl, async {
        store
            .find_movie(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movie not found.".to_string()))
    })
}

/// Loads several movies at once, keyed by id
///
/// Cache hits are served directly and the misses are read from the store in
/// one query, then queued for caching. Ids with no movie are absent from the
/// result.
pub async fn load_movies(
    store: &dyn EntityStore,
    cache: Option<&Cache>,
    ttl: u64,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Movie>> {
    let mut found = HashMap::with_capacity(ids.len());
    let mut missing = Vec::new();

    for id in ids {
        if found.contains_key(id) || missing.contains(id) {
            continue;
        }
        let Some(cache) = cache else {
            missing.push(*id);
            continue;
        };
        match cache.get_from_cache::<Movie>(&CacheKey::Movie(*id)).await {
            Ok(Some(movie)) => {
                found.insert(*id, movie);
            }
            Ok(None) => missing.push(*id),
            Err(e) => {
                tracing::warn!(error = %e, movie_id = %id, "Cache read failed, using the store");
                missing.push(*id);
            }
        }
    }

    if !missing.is_empty() {
        for movie in store.find_movies(&missing).await? {
            if let Some(cache) = cache {
                cache.set_in_background(&CacheKey::Movie(movie.id), &movie, ttl);
            }
            found.insert(movie.id, movie);
        }
    }

    tracing::debug!(
        requested = ids.len(),
        from_store = missing.len(),
        "Movies loaded"
    );

    Ok(found)
}

/// Drops a deleted movie from the cache
///
/// Failures are logged only: the cached copy expires on its own.
pub async fn invalidate_movie(cache: Option<&Cache>, id: Uuid) {
    if let Some(cache) = cache {
        if let Err(e) = cache.invalidate(&CacheKey::Movie(id)).await {
            tracing::warn!(error = %e, movie_id = %id, "Failed to invalidate cached movie");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MockEntityStore;
    use crate::models::NewMovie;
    use chrono::Utc;

    fn movie(title: &str) -> Movie {
        NewMovie {
            title: title.to_string(),
            ..Default::default()
        }
        .into_movie(Utc::now())
    }

    #[tokio::test]
    async fn test_get_movie_without_cache_reads_store() {
        let heat = movie("Heat");
        let expected = heat.clone();
        let mut store = MockEntityStore::new();
        store
            .expect_find_movie()
            .times(1)
            .returning(move |_| Ok(Some(heat.clone())));

        let found = get_movie(&store, None, 60, expected.id).await.unwrap();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn test_get_movie_missing_is_not_found() {
        let mut store = MockEntityStore::new();
        store.expect_find_movie().returning(|_| Ok(None));

        let err = get_movie(&store, None, 60, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_movies_queries_store_once_for_distinct_ids() {
        let heat = movie("Heat");
        let ronin = movie("Ronin");
        let ids = vec![heat.id, ronin.id, heat.id];
        let returned = vec![heat.clone(), ronin.clone()];

        let mut store = MockEntityStore::new();
        store
            .expect_find_movies()
            .withf(|ids| ids.len() == 2)
            .times(1)
            .returning(move |_| Ok(returned.clone()));

        let loaded = load_movies(&store, None, 60, &ids).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&ronin.id].title, "Ronin");
    }
}
