#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

/// Ancestor resolution, clipping and rescaling
pub mod autoscale;

/// Vector tile model and codec
pub mod mvt;

/// Tile sources and the raw tile cache
pub mod tiles;

mod pipeline;
pub use pipeline::{AutoScale, Overzoom, RenderedTile, TileOrigin, TileOutcome};
