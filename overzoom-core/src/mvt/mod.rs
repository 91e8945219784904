//! Vector tile data model and the MVT codec.
//!
//! Decoded tiles are a [`TileLayers`] map. Geometry is fully materialized as
//! floating point extent-space coordinates, so it can be clipped and rescaled
//! without another pass over the protobuf command stream.

mod commands;

mod decode;
pub use decode::decode_tile;

mod encode;
pub use encode::encode_tile;

mod error;
pub use error::CodecError;

mod model;
pub use model::{Coord, Feature, GeomType, Layer, Properties, PropertyValue, Ring, TileLayers};

use std::fmt::Debug;

use overzoom_tile_utils::TileInfo;

/// Turns raw tile bytes into layers of features.
pub trait TileCodec: Send + Sync + Debug {
    /// Decode `data`, whose format and compression are described by `info`.
    fn decode(&self, data: &[u8], info: TileInfo) -> Result<TileLayers, CodecError>;
}

/// [`TileCodec`] for Mapbox Vector Tiles, optionally compressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MvtCodec;

impl TileCodec for MvtCodec {
    fn decode(&self, data: &[u8], info: TileInfo) -> Result<TileLayers, CodecError> {
        decode_tile(data, info)
    }
}
