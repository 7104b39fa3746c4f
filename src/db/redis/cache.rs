use std::fmt::Display;

use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Movie(Uuid),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Movie(id) => write!(f, "movie:{}", id),
        }
    }
}

/// Creates a Redis client for the movie cache
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// A movie document waiting to be written by the background task
struct PendingWrite {
    key: CacheKey,
    payload: String,
    ttl: u64,
}

/// Read-through cache for movie documents
///
/// Reads go straight to Redis. Writes are queued onto a background task so a
/// slow Redis never holds up a response.
#[derive(Clone)]
pub struct Cache {
    client: Client,
    pending: mpsc::UnboundedSender<PendingWrite>,
}

/// Stops the background writer once queued writes are flushed
pub struct CacheWriterHandle {
    stop: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        if self.stop.send(()).await.is_err() {
            tracing::warn!("Cache writer already stopped");
        }
    }
}

impl Cache {
    /// Creates the cache and spawns its background writer
    pub async fn new(client: Client) -> (Self, CacheWriterHandle) {
        let (pending, queue) = mpsc::unbounded_channel();
        let (stop, stop_rx) = mpsc::channel(1);

        tokio::spawn(run_writer(client.clone(), queue, stop_rx));

        (Self { client, pending }, CacheWriterHandle { stop })
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Returns the cached value for `key`, or `None` on a miss
    pub async fn get_from_cache<T: DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key.to_string()).await?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                AppError::Internal(format!("Cached {} is not decodable: {}", key, e))
            })
        })
        .transpose()
    }

    /// Queues a write of `value` under `key`, expiring after `ttl` seconds
    pub fn set_in_background<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        let write = PendingWrite {
            key: key.clone(),
            payload,
            ttl,
        };
        if self.pending.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer stopped, dropping write");
        }
    }

    /// Removes `key` immediately
    ///
    /// Not queued: a pending background write for the same key may still land
    /// afterwards, bounded by its TTL.
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key.to_string()).await?;
        Ok(())
    }
}

async fn run_writer(
    client: Client,
    mut queue: mpsc::UnboundedReceiver<PendingWrite>,
    mut stop: mpsc::Receiver<()>,
) {
    tracing::info!("Cache writer started");

    loop {
        tokio::select! {
            Some(write) = queue.recv() => store(&client, write).await,
            _ = stop.recv() => break,
        }
    }

    // Clones of the cache may still hold senders, so drain instead of waiting for close
    let mut flushed = 0usize;
    while let Ok(write) = queue.try_recv() {
        store(&client, write).await;
        flushed += 1;
    }
    tracing::info!(flushed, "Cache writer stopped");
}

async fn store(client: &Client, write: PendingWrite) {
    let PendingWrite { key, payload, ttl } = write;
    if let Err(e) = set_with_expiry(client, &key, payload, ttl).await {
        tracing::error!(key = %key, error = %e, "Failed to write movie to cache");
    }
}

async fn set_with_expiry(
    client: &Client,
    key: &CacheKey,
    payload: String,
    ttl: u64,
) -> redis::RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    conn.set_ex(key.to_string(), payload, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Movie, NewMovie};

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    fn sample_movie() -> Movie {
        NewMovie {
            title: "Cache Test".to_string(),
            rating: Some(7.5),
            ..Default::default()
        }
        .into_movie(chrono::Utc::now())
    }

    #[test]
    fn test_cache_key_display_movie() {
        let id = Uuid::nil();
        assert_eq!(
            CacheKey::Movie(id).to_string(),
            "movie:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_cache_miss() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (cache, _handle) = Cache::new(client).await;

        let key = CacheKey::Movie(Uuid::new_v4());
        let retrieved: Option<Movie> = cache.get_from_cache(&key).await.unwrap();

        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_set_then_invalidate() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (cache, _handle) = Cache::new(client).await;

        let movie = sample_movie();
        let key = CacheKey::Movie(movie.id);
        cache.set_in_background(&key, &movie, 60);

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let retrieved: Option<Movie> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(movie));

        cache.invalidate(&key).await.unwrap();
        let retrieved: Option<Movie> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_cache_writer_flushes_on_shutdown() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (cache, handle) = Cache::new(client).await;

        let movie = sample_movie();
        let key = CacheKey::Movie(movie.id);
        cache.set_in_background(&key, &movie, 60);

        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let retrieved: Option<Movie> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(movie));

        cache.invalidate(&key).await.unwrap();
    }
}
