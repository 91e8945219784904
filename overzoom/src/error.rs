use std::io;
use std::path::PathBuf;

use overzoom_core::tiles::OverzoomCoreError;

/// A convenience [`Result`] for the overzoom crate.
pub type OverzoomResult<T> = Result<T, OverzoomError>;

#[derive(thiserror::Error, Debug)]
pub enum OverzoomError {
    #[error(
        "The --config and the archive argument cannot be used together. Please remove '{0}' or move it into the config file"
    )]
    ConfigAndArchiveError(String),

    #[error(
        "No archive given. Pass the path or URL of a .pmtiles file, or set 'archive' in the config file."
    )]
    NoArchive,

    #[error("No tiles requested. Pass one or more tiles as z/x/y")]
    NoTiles,

    #[error("MVT output is binary and needs an --output directory")]
    MvtToStdout,

    #[error("{0} of {1} tiles failed to render")]
    RenderFailures(usize, usize),

    #[error(transparent)]
    ConfigFileError(#[from] crate::config::file::ConfigFileError),

    #[error(transparent)]
    CoreError(#[from] OverzoomCoreError),

    #[error("Unable to write {1}: {0}")]
    WriteError(#[source] io::Error, PathBuf),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] io::Error),
}
