/// Read-through caching over an optional [`Cache`](crate::db::Cache).
///
/// With no cache configured the block runs directly. Otherwise a hit is
/// returned as is; on a miss the block runs and its value is queued for a
/// background write. A failed cache read is logged and treated as a miss.
/// Errors from the block propagate and nothing is cached.
///
/// # Arguments
/// * `$cache`: an `Option<&Cache>`
/// * `$key`: the [`CacheKey`](crate::db::CacheKey) to read and write
/// * `$ttl`: time-to-live of the written value, in seconds
/// * `$block`: a future yielding `AppResult<T>`
///
/// # Example
/// ```rust,ignore
/// let movie: Movie = cached!(state.cache.as_ref(), CacheKey::Movie(id), ttl, async {
///     store.find_movie(id).await?.ok_or(AppError::NotFound(msg))
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache {
            Some(cache) => match cache.get_from_cache(&key).await {
                Ok(Some(hit)) => Ok(hit),
                lookup => {
                    if let Err(e) = lookup {
                        tracing::warn!(error = %e, key = %key, "Cache read failed, using the store");
                    }
                    let value = $block.await?;
                    cache.set_in_background(&key, &value, $ttl);
                    Ok(value)
                }
            },
            None => $block.await,
        }
    }};
}
