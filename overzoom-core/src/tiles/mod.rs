//! Tile sources feeding the overzoom pipeline, and the raw tile cache in front of them.

mod cache;
pub use cache::{NO_TILE_CACHE, OptTileCache, TileCache};

mod error;
pub use error::{OverzoomCoreError, OverzoomCoreResult};

#[cfg(feature = "pmtiles")]
pub mod pmtiles;

use std::fmt::Debug;

use async_trait::async_trait;
use overzoom_tile_utils::{TileCoord, TileData, TileInfo};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Archive-wide information needed before any tile can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub min_zoom: u8,
    /// The deepest zoom level with real tile data.
    pub max_zoom: u8,
    pub tile_info: TileInfo,
}

/// A tiled, zoom-indexed archive.
///
/// Implementors only move bytes around; decoding happens in a
/// [`TileCodec`](crate::mvt::TileCodec).
#[async_trait]
pub trait TileSource: Send + Sync + Debug {
    /// Unique source identifier, also used as the cache namespace.
    fn get_id(&self) -> &str;

    /// Reads the archive header. May be slow, the pipeline calls it at most
    /// once per successful read.
    async fn get_header(&self) -> OverzoomCoreResult<ArchiveHeader>;

    /// Fetches the raw bytes of one tile, or `None` if the archive has no such tile.
    ///
    /// Implementations that can abort in-flight I/O should watch `cancel`.
    /// Callers race this future against the token anyway.
    async fn fetch(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> OverzoomCoreResult<Option<TileData>>;
}

/// Boxed tile source trait object.
pub type BoxedSource = Box<dyn TileSource>;

#[async_trait]
impl TileSource for BoxedSource {
    fn get_id(&self) -> &str {
        self.as_ref().get_id()
    }

    async fn get_header(&self) -> OverzoomCoreResult<ArchiveHeader> {
        self.as_ref().get_header().await
    }

    async fn fetch(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> OverzoomCoreResult<Option<TileData>> {
        self.as_ref().fetch(coord, cancel).await
    }
}
