//! Error types for `PMTiles` operations.

use pmtiles::PmtError;

/// Errors that can occur when working with `PMTiles` files.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum PmtilesError {
    /// Wrapper for underlying `PMTiles` library errors.
    #[error(transparent)]
    PmtError(#[from] PmtError),

    /// `PMTiles` error with additional context.
    #[error(r"PMTiles error {0:?} processing {1}")]
    PmtErrorWithCtx(#[source] PmtError, String),

    /// Only vector tiles can be clipped and rescaled.
    #[error("Source {0} contains {1} tiles at {2}, only vector tiles are supported")]
    UnsupportedTileType(String, String, String),

    /// Unknown tile type encountered while processing `PMTiles` file.
    #[error("Unknown tile type for source {0} ({1} at path {2})")]
    UnknownTileType(String, String, String),
}
