//! Synthesizing tiles deeper than the archive's native max zoom.
//!
//! [`resolve`] finds the native-zoom ancestor of a requested tile and the
//! [`SubRegion`] of the ancestor the requested tile covers. [`reproject`] clips
//! the ancestor's geometry to that region and rescales it to fill a whole tile.
//! Both are synchronous and pure.

mod clip;
pub use clip::{clip_line, clip_points, clip_polygon_ring, ring_area};

mod reproject;
pub use reproject::{reproject, reproject_layer};

mod resolver;
pub use resolver::{Resolution, SubRegion, resolve};

use overzoom_tile_utils::TileCoord;

#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Tiles at or above native zoom are read from the archive as-is.
    #[error("Tile {0:#} is not deeper than the native max zoom {1}")]
    NotOverzoomed(TileCoord, u8),

    #[error("Tile {0:#} is outside of the tile pyramid")]
    InvalidCoord(TileCoord),
}
