//! Error types for vector tile decoding.

use overzoom_tile_utils::{Encoding, Format};

/// Errors raised while turning raw tile bytes into layers.
///
/// These are data-integrity failures of the archive and are always propagated,
/// never rendered as an empty tile.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The payload could not be decompressed with the encoding the archive declared.
    #[error("Unable to decompress {1:?} tile data: {0}")]
    Decompress(#[source] std::io::Error, Encoding),

    /// The payload is not a valid protobuf vector tile.
    #[error("Unable to decode vector tile protobuf: {0}")]
    Protobuf(String),

    /// The archive holds tiles that are not vector tiles.
    #[error("Tiles of format {0} cannot be decoded as vector tiles")]
    NotVectorTile(Format),

    /// A feature geometry command stream is inconsistent.
    #[error("Malformed geometry in layer {0}: {1}")]
    MalformedGeometry(String, &'static str),

    /// A feature references a key or value that is not in the layer tables.
    #[error("Feature tag index {1} is out of range in layer {0}")]
    InvalidTag(String, u32),
}
