//! `PMTiles` tile source.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use object_store::ObjectStore;
use object_store::path::Path;
use overzoom_tile_utils::{Encoding, Format, TileCoord, TileData, TileInfo};
use pmtiles::{AsyncPmTilesReader, Compression, ObjectStoreBackend, TileType};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::tiles::pmtiles::PmtilesError;
use crate::tiles::{ArchiveHeader, OverzoomCoreResult, TileSource};

/// A source for `PMTiles` files using `ObjectStoreBackend`.
///
/// Nothing is read until the header or a tile is first requested. If opening
/// fails, the next request tries again.
pub struct PmtilesSource {
    id: String,
    store: Arc<dyn ObjectStore>,
    path: Path,
    archive: OnceCell<OpenArchive>,
}

struct OpenArchive {
    reader: AsyncPmTilesReader<ObjectStoreBackend>,
    header: ArchiveHeader,
}

#[expect(clippy::missing_fields_in_debug)]
impl Debug for PmtilesSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PmtilesSource")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("open", &self.archive.initialized())
            .finish()
    }
}

impl PmtilesSource {
    /// Create a new `PmtilesSource` from an id, an [`ObjectStore`] and the path of the `.pmtiles` file
    pub fn new(id: String, store: Arc<dyn ObjectStore>, path: impl Into<Path>) -> Self {
        Self {
            id,
            store,
            path: path.into(),
            archive: OnceCell::new(),
        }
    }

    async fn archive(&self) -> Result<&OpenArchive, PmtilesError> {
        self.archive.get_or_try_init(|| self.open()).await
    }

    async fn open(&self) -> Result<OpenArchive, PmtilesError> {
        let store_to_string = self.store.to_string();
        let backend = ObjectStoreBackend::new(Box::new(Arc::clone(&self.store)), self.path.clone());
        let reader = AsyncPmTilesReader::try_from_source(backend)
            .await
            .map_err(|e| {
                PmtilesError::PmtErrorWithCtx(e, format!("{store_to_string} at {}", self.path))
            })?;

        let hdr = reader.get_header();
        let tile_info = match hdr.tile_type {
            TileType::Mvt => TileInfo::new(
                Format::Mvt,
                match hdr.tile_compression {
                    Compression::None => Encoding::Uncompressed,
                    Compression::Unknown => {
                        warn!(
                            "MVT tiles of source {} ({store_to_string} at {}) has unknown compression",
                            self.id, self.path
                        );
                        Encoding::Uncompressed
                    }
                    Compression::Gzip => Encoding::Gzip,
                    Compression::Brotli => Encoding::Brotli,
                    Compression::Zstd => Encoding::Zstd,
                },
            ),
            TileType::Png | TileType::Jpeg | TileType::Webp => {
                return Err(PmtilesError::UnsupportedTileType(
                    self.id.clone(),
                    format!("{:?}", hdr.tile_type),
                    self.path.to_string(),
                ));
            }
            TileType::Unknown => {
                return Err(PmtilesError::UnknownTileType(
                    self.id.clone(),
                    store_to_string,
                    self.path.to_string(),
                ));
            }
        };
        if hdr.min_zoom > hdr.max_zoom {
            warn!(
                "Source {} declares min zoom {} above max zoom {}",
                self.id, hdr.min_zoom, hdr.max_zoom
            );
        }

        let header = ArchiveHeader {
            min_zoom: hdr.min_zoom,
            max_zoom: hdr.max_zoom,
            tile_info,
        };
        info!(
            "Opened {} ({store_to_string} at {}): {tile_info} tiles, native zoom {}..={}",
            self.id, self.path, header.min_zoom, header.max_zoom
        );
        Ok(OpenArchive { reader, header })
    }
}

#[async_trait]
impl TileSource for PmtilesSource {
    fn get_id(&self) -> &str {
        &self.id
    }

    async fn get_header(&self) -> OverzoomCoreResult<ArchiveHeader> {
        Ok(self.archive().await?.header)
    }

    async fn fetch(
        &self,
        coord: TileCoord,
        _cancel: &CancellationToken,
    ) -> OverzoomCoreResult<Option<TileData>> {
        let archive = self.archive().await?;
        let pmt_coord =
            pmtiles::TileCoord::new(coord.z, coord.x, coord.y).map_err(PmtilesError::PmtError)?;
        let tile = archive
            .reader
            .get_tile(pmt_coord)
            .await
            .map_err(PmtilesError::PmtError)?;
        if tile.is_none() {
            trace!("Couldn't find tile data in {coord:#} of {}", self.id);
        }
        Ok(tile.map(|t| t.to_vec()))
    }
}
