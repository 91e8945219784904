use std::fmt::{Display, Formatter};
use std::str::FromStr;

use overzoom_tile_utils::{DEFAULT_EXTENT, TileCoord, TileData};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::autoscale::{Resolution, ResolveError, reproject, resolve};
use crate::mvt::{MvtCodec, TileCodec, TileLayers};
use crate::tiles::{ArchiveHeader, OptTileCache, OverzoomCoreResult, TileSource};

/// How tiles deeper than the archive's native max zoom are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoScale {
    /// Clip the ancestor tile's geometry and rescale it to the requested tile.
    #[default]
    Geometry,
    /// Return the ancestor tile unchanged and let the renderer scale it.
    Delegate,
    /// Ask the archive for the requested tile as-is.
    Off,
}

impl Display for AutoScale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Geometry => "geometry",
            Self::Delegate => "delegate",
            Self::Off => "off",
        })
    }
}

impl FromStr for AutoScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geometry" => Ok(Self::Geometry),
            "delegate" => Ok(Self::Delegate),
            "off" => Ok(Self::Off),
            _ => Err(format!(
                "Unknown autoscale mode '{s}', expected one of geometry, delegate, off"
            )),
        }
    }
}

/// How the layers of a [`RenderedTile`] relate to the archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TileOrigin {
    /// Decoded from the requested tile itself.
    Direct,
    /// Clipped and rescaled from the ancestor named in the resolution.
    Reprojected(Resolution),
    /// The ancestor's layers, untouched. Scaling is left to the consumer.
    Delegated(Resolution),
}

/// A tile ready to be handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTile {
    pub coord: TileCoord,
    pub origin: TileOrigin,
    pub layers: TileLayers,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    Rendered(RenderedTile),
    /// The request's token fired before the tile was produced.
    Cancelled,
}

impl TileOutcome {
    #[must_use]
    pub fn rendered(self) -> Option<RenderedTile> {
        match self {
            Self::Rendered(tile) => Some(tile),
            Self::Cancelled => None,
        }
    }
}

/// Serves tiles from a [`TileSource`], synthesizing tiles past its native max zoom.
///
/// The archive header is read by the first request and shared by all later
/// ones. Requests are independent and may run concurrently.
#[derive(Debug)]
pub struct Overzoom<S, C = MvtCodec> {
    source: S,
    codec: C,
    cache: OptTileCache,
    autoscale: AutoScale,
    header: OnceCell<ArchiveHeader>,
}

impl<S: TileSource> Overzoom<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            codec: MvtCodec,
            cache: None,
            autoscale: AutoScale::default(),
            header: OnceCell::new(),
        }
    }
}

impl<S: TileSource, C: TileCodec> Overzoom<S, C> {
    /// Replace the codec used to decode raw tiles.
    #[must_use]
    pub fn with_codec<C2: TileCodec>(self, codec: C2) -> Overzoom<S, C2> {
        Overzoom {
            source: self.source,
            codec,
            cache: self.cache,
            autoscale: self.autoscale,
            header: self.header,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: OptTileCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_autoscale(mut self, autoscale: AutoScale) -> Self {
        self.autoscale = autoscale;
        self
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn autoscale(&self) -> AutoScale {
        self.autoscale
    }

    /// The archive header, read from the source on first use.
    ///
    /// A failed read is returned to the caller and attempted again next time.
    pub async fn header(&self) -> OverzoomCoreResult<ArchiveHeader> {
        self.header
            .get_or_try_init(|| self.source.get_header())
            .await
            .copied()
    }

    /// Produce the tile at `coord`.
    ///
    /// Tiles at or above the native max zoom are decoded as stored. Deeper tiles
    /// are built from their native-zoom ancestor according to the
    /// [`AutoScale`] mode. A tile missing from the archive renders as empty
    /// layers. If `cancel` fires first, [`TileOutcome::Cancelled`] is returned.
    pub async fn render(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> OverzoomCoreResult<TileOutcome> {
        if !coord.is_valid() {
            return Err(ResolveError::InvalidCoord(coord).into());
        }

        let header = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(TileOutcome::Cancelled),
            header = self.header() => header?,
        };

        let origin = if coord.z > header.max_zoom && self.autoscale != AutoScale::Off {
            let resolution = resolve(coord, header.max_zoom, DEFAULT_EXTENT)?;
            debug!(
                "Tile {coord:#} resolved to ancestor {:#} (delta zoom {})",
                resolution.ancestor, resolution.delta_zoom
            );
            match self.autoscale {
                AutoScale::Delegate => TileOrigin::Delegated(resolution),
                _ => TileOrigin::Reprojected(resolution),
            }
        } else {
            TileOrigin::Direct
        };
        let fetch_coord = match &origin {
            TileOrigin::Direct => coord,
            TileOrigin::Reprojected(res) | TileOrigin::Delegated(res) => res.ancestor,
        };

        let data = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(TileOutcome::Cancelled),
            data = self.fetch(fetch_coord, cancel) => data?,
        };
        if cancel.is_cancelled() {
            return Ok(TileOutcome::Cancelled);
        }

        let layers = match data {
            Some(data) => self.codec.decode(&data, header.tile_info)?,
            None => {
                trace!("Tile {fetch_coord:#} is absent, rendering {coord:#} as empty");
                TileLayers::new()
            }
        };
        let layers = match &origin {
            TileOrigin::Reprojected(res) => reproject(layers, res),
            TileOrigin::Direct | TileOrigin::Delegated(_) => layers,
        };

        Ok(TileOutcome::Rendered(RenderedTile {
            coord,
            origin,
            layers,
        }))
    }

    async fn fetch(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> OverzoomCoreResult<Option<TileData>> {
        match &self.cache {
            Some(cache) => {
                cache
                    .get_or_insert(self.source.get_id(), coord, self.source.fetch(coord, cancel))
                    .await
            }
            None => self.source.fetch(coord, cancel).await,
        }
    }
}
