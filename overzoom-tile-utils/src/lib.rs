#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

// This code was partially adapted from https://github.com/maplibre/martin
// project originally licensed under MIT/Apache-2.0

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod decoders;
pub use decoders::{decode_brotli, decode_gzip, decode_zlib, decode_zstd, encode_gzip};

/// Deepest zoom level the tile pyramid supports.
///
/// At zoom 30 a tile index still fits in `u32` and `2^30` tiles per axis is far
/// beyond any real archive.
pub const MAX_ZOOM: u8 = 30;

/// Default MVT layer extent.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Raw bytes of a single tile, as stored in an archive.
pub type TileData = Vec<u8>;

/// A tile address in the standard power-of-two tile pyramid.
///
/// `x` and `y` must be below `2^z`, see [`TileCoord::is_valid`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Creates a coordinate, returning `None` if `x` or `y` fall outside the zoom level.
    #[must_use]
    pub fn new_checked(z: u8, x: u32, y: u32) -> Option<Self> {
        let coord = Self { z, x, y };
        coord.is_valid().then_some(coord)
    }

    /// Number of tiles along one axis at this zoom level.
    #[must_use]
    pub fn axis_len(zoom: u8) -> u64 {
        1_u64.checked_shl(u32::from(zoom)).unwrap_or(u64::MAX)
    }

    /// Whether `x` and `y` are inside `[0, 2^z)`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let len = Self::axis_len(self.z);
        u64::from(self.x) < len && u64::from(self.y) < len
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{}/{}/{}", self.z, self.x, self.y)
        } else {
            write!(f, "{},{},{}", self.z, self.x, self.y)
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TileCoordError {
    #[error("Tile coordinate '{0}' must be in the form z/x/y")]
    InvalidFormat(String),

    #[error("Tile coordinate {0:#} is outside of the tile pyramid")]
    OutOfRange(TileCoord),
}

impl FromStr for TileCoord {
    type Err = TileCoordError;

    /// Parses `z/x/y`, the order used in tile URLs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TileCoordError::InvalidFormat(s.to_string());
        let mut parts = s.trim().split('/');
        let mut next = || parts.next().ok_or_else(invalid);
        let z = next()?.parse::<u8>().map_err(|_| invalid())?;
        let x = next()?.parse::<u32>().map_err(|_| invalid())?;
        let y = next()?.parse::<u32>().map_err(|_| invalid())?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        let coord = Self { z, x, y };
        if z > MAX_ZOOM || !coord.is_valid() {
            return Err(TileCoordError::OutOfRange(coord));
        }
        Ok(coord)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Gif,
    Jpeg,
    Json,
    Mvt,
    Png,
    Webp,
}

impl Format {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.to_ascii_lowercase().as_str() {
            "gif" => Self::Gif,
            "jpg" | "jpeg" => Self::Jpeg,
            "json" => Self::Json,
            "pbf" | "mvt" => Self::Mvt,
            "png" => Self::Png,
            "webp" => Self::Webp,
            _ => None?,
        })
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        match *self {
            Self::Gif => "image/gif",
            Self::Jpeg => "image/jpeg",
            Self::Json => "application/json",
            Self::Mvt => "application/x-protobuf",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// File extension used when writing tiles of this format to disk.
    #[must_use]
    pub fn extension(&self) -> &str {
        match *self {
            Self::Gif => "gif",
            Self::Jpeg => "jpg",
            Self::Json => "json",
            Self::Mvt => "mvt",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    #[must_use]
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Mvt)
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Data is not compressed
    #[default]
    Uncompressed = 0b0000_0000,
    /// Some formats like JPEG and PNG are already compressed
    Internal = 0b0000_0001,
    Gzip = 0b0000_0010,
    Zlib = 0b0000_0100,
    Brotli = 0b0000_1000,
    Zstd = 0b0001_0000,
}

impl Encoding {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.to_ascii_lowercase().as_str() {
            "none" => Self::Uncompressed,
            "gzip" => Self::Gzip,
            "zlib" => Self::Zlib,
            "brotli" => Self::Brotli,
            "zstd" => Self::Zstd,
            _ => None?,
        })
    }

    #[must_use]
    pub fn content_encoding(&self) -> Option<&str> {
        match *self {
            Self::Uncompressed | Self::Internal => None,
            Self::Gzip => Some("gzip"),
            Self::Zlib => Some("deflate"),
            Self::Brotli => Some("br"),
            Self::Zstd => Some("zstd"),
        }
    }

    #[must_use]
    pub fn is_encoded(&self) -> bool {
        match *self {
            Self::Uncompressed | Self::Internal => false,
            Self::Gzip | Self::Zlib | Self::Brotli | Self::Zstd => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileInfo {
    pub format: Format,
    pub encoding: Encoding,
}

impl TileInfo {
    #[must_use]
    pub fn new(format: Format, encoding: Encoding) -> Self {
        Self { format, encoding }
    }

    /// Try to figure out the format and encoding of the raw tile data.
    ///
    /// Compressed payloads are assumed to be MVT, like most archives store them.
    #[must_use]
    pub fn detect(value: &[u8]) -> Option<Self> {
        Some(match value {
            v if v.starts_with(b"\x1f\x8b") => Self::new(Format::Mvt, Encoding::Gzip),
            v if v.starts_with(b"\x78\x9c") => Self::new(Format::Mvt, Encoding::Zlib),
            v if v.starts_with(b"\x28\xb5\x2f\xfd") => Self::new(Format::Mvt, Encoding::Zstd),
            v if v.starts_with(b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A") => Format::Png.into(),
            v if v.starts_with(b"\x47\x49\x46\x38\x39\x61") => Format::Gif.into(),
            v if v.starts_with(b"\xFF\xD8\xFF") => Format::Jpeg.into(),
            v if v.len() >= 12 && v.starts_with(b"RIFF") && &v[8..12] == b"WEBP" => {
                Format::Webp.into()
            }
            v if v.starts_with(b"{") => Format::Json.into(),
            _ => None?,
        })
    }

    #[must_use]
    pub fn encoding(self, encoding: Encoding) -> Self {
        Self { encoding, ..self }
    }
}

impl From<Format> for TileInfo {
    fn from(format: Format) -> Self {
        Self::new(
            format,
            match format {
                Format::Png | Format::Jpeg | Format::Webp | Format::Gif => Encoding::Internal,
                Format::Mvt | Format::Json => Encoding::Uncompressed,
            },
        )
    }
}

impl Display for TileInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format.content_type())?;
        if let Some(encoding) = self.encoding.content_encoding() {
            write!(f, "; encoding={encoding}")?;
        } else if self.encoding != Encoding::Uncompressed {
            write!(f, "; uncompressed")?;
        }
        Ok(())
    }
}
