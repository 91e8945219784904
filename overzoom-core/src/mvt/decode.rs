use std::borrow::Cow;

use geozero::mvt::{Message as _, Tile, tile};
use overzoom_tile_utils::{
    DEFAULT_EXTENT, Encoding, Format, TileInfo, decode_brotli, decode_gzip, decode_zlib,
    decode_zstd,
};
use tracing::warn;

use crate::mvt::commands::{Command, decode_parameter};
use crate::mvt::{CodecError, Coord, Feature, GeomType, Layer, PropertyValue, Ring, TileLayers};

/// Undo the archive-level compression of a tile payload.
fn decompress(data: &[u8], encoding: Encoding) -> Result<Cow<'_, [u8]>, CodecError> {
    let decoded = match encoding {
        Encoding::Uncompressed | Encoding::Internal => return Ok(Cow::Borrowed(data)),
        Encoding::Gzip => decode_gzip(data),
        Encoding::Zlib => decode_zlib(data),
        Encoding::Brotli => decode_brotli(data),
        Encoding::Zstd => decode_zstd(data),
    };
    decoded
        .map(Cow::Owned)
        .map_err(|e| CodecError::Decompress(e, encoding))
}

/// Decode a (possibly compressed) MVT payload into fully materialized layers.
pub fn decode_tile(data: &[u8], info: TileInfo) -> Result<TileLayers, CodecError> {
    if info.format != Format::Mvt {
        return Err(CodecError::NotVectorTile(info.format));
    }
    let data = decompress(data, info.encoding)?;
    let tile = Tile::decode(data.as_ref()).map_err(|e| CodecError::Protobuf(e.to_string()))?;

    let mut layers = TileLayers::new();
    for layer in tile.layers {
        let decoded = decode_layer(layer)?;
        if layers.contains_key(&decoded.name) {
            warn!(
                "Tile contains more than one layer named {}, only the first one is kept",
                decoded.name
            );
            continue;
        }
        layers.insert(decoded.name.clone(), decoded);
    }
    Ok(layers)
}

fn decode_layer(layer: tile::Layer) -> Result<Layer, CodecError> {
    let tile::Layer {
        version,
        name,
        features,
        keys,
        values,
        extent,
        ..
    } = layer;
    let values: Vec<PropertyValue> = values.into_iter().map(decode_value).collect();

    let mut result = Layer {
        name,
        extent: extent.unwrap_or(DEFAULT_EXTENT),
        version,
        features: Vec::with_capacity(features.len()),
    };
    for feature in features {
        let geom_type = GeomType::from_mvt(feature.r#type.unwrap_or_default());
        let geometry = decode_geometry(geom_type, &feature.geometry)
            .map_err(|reason| CodecError::MalformedGeometry(result.name.clone(), reason))?;

        let mut decoded = Feature::new(geom_type, geometry);
        decoded.id = feature.id;
        for pair in feature.tags.chunks(2) {
            let [key_idx, value_idx] = *pair else {
                return Err(CodecError::MalformedGeometry(
                    result.name.clone(),
                    "feature tags must come in key/value pairs",
                ));
            };
            let key = keys
                .get(key_idx as usize)
                .ok_or_else(|| CodecError::InvalidTag(result.name.clone(), key_idx))?;
            let value = values
                .get(value_idx as usize)
                .ok_or_else(|| CodecError::InvalidTag(result.name.clone(), value_idx))?;
            decoded.properties.insert(key.clone(), value.clone());
        }
        result.features.push(decoded);
    }
    Ok(result)
}

fn decode_value(value: tile::Value) -> PropertyValue {
    if let Some(v) = value.string_value {
        PropertyValue::String(v)
    } else if let Some(v) = value.float_value {
        PropertyValue::Float(v)
    } else if let Some(v) = value.double_value {
        PropertyValue::Double(v)
    } else if let Some(v) = value.int_value {
        PropertyValue::Int(v)
    } else if let Some(v) = value.uint_value {
        PropertyValue::Uint(v)
    } else if let Some(v) = value.sint_value {
        PropertyValue::Int(v)
    } else if let Some(v) = value.bool_value {
        PropertyValue::Bool(v)
    } else {
        PropertyValue::String(String::new())
    }
}

/// Walk the MVT command stream and produce absolute-coordinate rings.
pub(crate) fn decode_geometry(
    geom_type: GeomType,
    commands: &[u32],
) -> Result<Vec<Ring>, &'static str> {
    let mut rings = Vec::new();
    let mut current: Ring = Vec::new();
    let (mut cx, mut cy) = (0_i64, 0_i64);
    let mut iter = commands.iter().copied();

    let mut next_point = |iter: &mut dyn Iterator<Item = u32>| -> Result<Coord, &'static str> {
        let (Some(dx), Some(dy)) = (iter.next(), iter.next()) else {
            return Err("command parameters are truncated");
        };
        cx += decode_parameter(dx);
        cy += decode_parameter(dy);
        #[allow(clippy::cast_precision_loss)]
        let point = Coord::new(cx as f64, cy as f64);
        Ok(point)
    };

    while let Some(integer) = iter.next() {
        let Some((command, count)) = Command::parse(integer) else {
            return Err("unknown geometry command");
        };
        match command {
            Command::MoveTo => {
                for _ in 0..count {
                    let point = next_point(&mut iter)?;
                    if geom_type == GeomType::Point {
                        rings.push(vec![point]);
                    } else {
                        if !current.is_empty() {
                            rings.push(std::mem::take(&mut current));
                        }
                        current.push(point);
                    }
                }
            }
            Command::LineTo => {
                if current.is_empty() {
                    return Err("LineTo without a preceding MoveTo");
                }
                for _ in 0..count {
                    current.push(next_point(&mut iter)?);
                }
            }
            Command::ClosePath => {
                if current.is_empty() {
                    return Err("ClosePath without an open ring");
                }
                if current.len() > 1 && current.first() == current.last() {
                    current.pop();
                }
                rings.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        rings.push(current);
    }
    Ok(rings)
}
