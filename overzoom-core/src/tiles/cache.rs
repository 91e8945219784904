use std::time::Duration;

use moka::future::Cache;
use overzoom_tile_utils::{TileCoord, TileData};
use tracing::{info, trace, warn};

use crate::tiles::OverzoomCoreResult;

/// Cache of raw tile bytes, including the fact that a tile is absent.
///
/// Every descendant of one ancestor tile hits the same entry, so an ancestor is
/// fetched once no matter how many deeper tiles are synthesized from it.
/// Concurrent misses for the same key share a single fetch.
#[derive(Clone, Debug)]
pub struct TileCache(Cache<TileCacheKey, Option<TileData>>);

impl TileCache {
    /// Creates a new tile cache with the specified maximum size in bytes.
    ///
    /// # Arguments
    ///
    /// * `max_size_bytes` - Maximum cache size in bytes (based on tile data size)
    /// * `expiry` - Optional maximum lifetime (TTL - time to live from creation)
    /// * `idle_timeout` - Optional idle timeout (TTI - time to idle since last access)
    #[must_use]
    pub fn new(
        max_size_bytes: u64,
        expiry: Option<Duration>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let mut builder = Cache::builder()
            .name("raw_tile_cache")
            .weigher(|_key: &TileCacheKey, value: &Option<TileData>| -> u32 {
                let data = value.as_ref().map_or(0, Vec::len);
                (data + size_of::<TileCacheKey>())
                    .try_into()
                    .unwrap_or(u32::MAX)
            })
            .max_capacity(max_size_bytes)
            .support_invalidation_closures();

        if let Some(ttl) = expiry {
            builder = builder.time_to_live(ttl);
            trace!("Tile cache configured with TTL of {ttl:?}");
        }

        if let Some(tti) = idle_timeout {
            builder = builder.time_to_idle(tti);
            trace!("Tile cache configured with TTI of {tti:?}");
        }

        Self(builder.build())
    }

    /// Gets a tile from cache or fetches it using the provided future.
    ///
    /// Errors are not cached, the next caller fetches again.
    pub async fn get_or_insert<Fut>(
        &self,
        source_id: &str,
        coord: TileCoord,
        fetch: Fut,
    ) -> OverzoomCoreResult<Option<TileData>>
    where
        Fut: Future<Output = OverzoomCoreResult<Option<TileData>>>,
    {
        let key = TileCacheKey::new(source_id, coord);
        let entry = self.0.entry(key).or_try_insert_with(fetch).await?;
        if entry.is_fresh() {
            trace!("Tile cache MISS for {coord:#} of {source_id}");
        } else {
            trace!(
                "Tile cache HIT for {coord:#} of {source_id} (entries={entries}, size={size}B)",
                entries = self.0.entry_count(),
                size = self.0.weighted_size()
            );
        }
        Ok(entry.into_value())
    }

    /// Invalidates all cached tiles for a specific source.
    pub async fn invalidate_source(&self, source_id: &str) {
        let id = source_id.to_string();
        if let Err(e) = self.0.invalidate_entries_if(move |key, _| key.source_id == id) {
            warn!("Unable to invalidate tile cache for source {source_id}: {e}");
            return;
        }
        self.0.run_pending_tasks().await;
        info!("Invalidated tile cache for source: {source_id}");
    }

    /// Invalidates all cached tiles.
    pub fn invalidate_all(&self) {
        self.0.invalidate_all();
        info!("Invalidated all tile cache entries");
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.0.entry_count()
    }

    /// Returns the total size of cached data in bytes.
    #[must_use]
    pub fn weighted_size(&self) -> u64 {
        self.0.weighted_size()
    }

    /// Applies pending maintenance so that statistics are up to date.
    pub async fn sync(&self) {
        self.0.run_pending_tasks().await;
    }
}

/// Optional wrapper for `TileCache`.
pub type OptTileCache = Option<TileCache>;

/// Constant representing no tile cache configuration.
pub const NO_TILE_CACHE: OptTileCache = None;

/// Cache key for raw tile data.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
struct TileCacheKey {
    source_id: String,
    coord: TileCoord,
}

impl TileCacheKey {
    fn new(source_id: &str, coord: TileCoord) -> Self {
        Self {
            source_id: source_id.to_string(),
            coord,
        }
    }
}
