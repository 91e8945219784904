use std::sync::Arc;

use crate::autoscale::ResolveError;
use crate::mvt::CodecError;

/// Errors that can occur while producing a tile.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum OverzoomCoreError {
    /// Errors from the [`mvt`](crate::mvt) codec, i.e. malformed tile bytes.
    #[error(transparent)]
    CodecError(#[from] CodecError),

    #[error(transparent)]
    ResolveError(#[from] ResolveError),

    /// Errors that can occur during [`pmtiles`](crate::tiles::pmtiles) processing operations.
    #[cfg(feature = "pmtiles")]
    #[error(transparent)]
    PmtilesError(#[from] super::pmtiles::PmtilesError),

    /// An error shared by several requests waiting on the same cached fetch.
    #[error(transparent)]
    SharedError(Arc<OverzoomCoreError>),

    /// Errors occurring from other sources, not implemented by `overzoom-core`.
    #[error(transparent)]
    OtherError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A convenience [`Result`] for tiles coming from `overzoom-core`.
pub type OverzoomCoreResult<T> = Result<T, OverzoomCoreError>;

impl From<Arc<OverzoomCoreError>> for OverzoomCoreError {
    fn from(error: Arc<OverzoomCoreError>) -> Self {
        Arc::try_unwrap(error).unwrap_or_else(Self::SharedError)
    }
}
