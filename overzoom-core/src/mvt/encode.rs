use geozero::mvt::{Message as _, TagsBuilder, Tile, TileValue, tile};

use crate::mvt::commands::{Command, encode_parameter};
use crate::mvt::{Feature, GeomType, Layer, PropertyValue, TileLayers};

/// Encode layers as an uncompressed MVT payload.
///
/// Coordinates are rounded to the integer grid here, and only here.
#[must_use]
pub fn encode_tile(layers: &TileLayers) -> Vec<u8> {
    let tile = Tile {
        layers: layers.values().map(encode_layer).collect(),
    };
    tile.encode_to_vec()
}

fn encode_layer(layer: &Layer) -> tile::Layer {
    let mut tag_builder = TagsBuilder::<String>::new();
    let mut features = Vec::with_capacity(layer.features.len());

    for feature in &layer.features {
        let Some(geometry) = encode_geometry(feature) else {
            continue;
        };
        let mut tags = Vec::with_capacity(feature.properties.len() * 2);
        for (key, value) in &feature.properties {
            let (key_idx, val_idx) = tag_builder.insert(key.clone(), tile_value(value));
            tags.push(key_idx);
            tags.push(val_idx);
        }
        features.push(tile::Feature {
            id: feature.id,
            tags,
            r#type: Some(feature.geom_type.to_mvt()),
            geometry,
        });
    }

    let (keys, values) = tag_builder.into_tags();
    tile::Layer {
        version: layer.version,
        name: layer.name.clone(),
        features,
        keys,
        values: values.into_iter().map(Into::into).collect(),
        extent: Some(layer.extent),
    }
}

fn tile_value(value: &PropertyValue) -> TileValue {
    match value {
        PropertyValue::String(v) => TileValue::Str(v.clone()),
        PropertyValue::Bool(v) => TileValue::Bool(*v),
        PropertyValue::Int(v) => TileValue::Int(*v),
        PropertyValue::Uint(v) => TileValue::Uint(*v),
        PropertyValue::Float(v) => TileValue::Float(*v),
        PropertyValue::Double(v) => TileValue::Double(*v),
    }
}

/// Rounded rings, with consecutive duplicates removed.
#[allow(clippy::cast_possible_truncation)]
fn integer_rings(feature: &Feature) -> Vec<Vec<(i32, i32)>> {
    feature
        .geometry
        .iter()
        .map(|ring| {
            let mut points: Vec<(i32, i32)> = ring
                .iter()
                .map(|c| (c.x.round() as i32, c.y.round() as i32))
                .collect();
            points.dedup();
            points
        })
        .collect()
}

fn encode_geometry(feature: &Feature) -> Option<Vec<u32>> {
    let rings = integer_rings(feature);
    let mut encoder = GeometryEncoder::default();
    match feature.geom_type {
        GeomType::Point => {
            let points: Vec<(i32, i32)> = rings.into_iter().flatten().collect();
            encoder.move_to(&points);
        }
        GeomType::LineString => {
            for line in rings.iter().filter(|r| r.len() >= 2) {
                encoder.move_to(&line[..1]);
                encoder.line_to(&line[1..]);
            }
        }
        GeomType::Polygon => {
            for ring in &rings {
                let ring = match ring.as_slice() {
                    [first, inner @ .., last] if first == last => &ring[..=inner.len()],
                    _ => ring.as_slice(),
                };
                if ring.len() < 3 {
                    continue;
                }
                encoder.move_to(&ring[..1]);
                encoder.line_to(&ring[1..]);
                encoder.close_path();
            }
        }
        GeomType::Unknown => return None,
    }
    (!encoder.encoded.is_empty()).then_some(encoder.encoded)
}

/// Emits MVT commands with cursor-relative parameters.
#[derive(Default)]
struct GeometryEncoder {
    encoded: Vec<u32>,
    cx: i32,
    cy: i32,
}

impl GeometryEncoder {
    fn move_to(&mut self, points: &[(i32, i32)]) {
        self.command(Command::MoveTo, points);
    }

    fn line_to(&mut self, points: &[(i32, i32)]) {
        self.command(Command::LineTo, points);
    }

    fn close_path(&mut self) {
        self.encoded.push(Command::ClosePath.integer(1));
    }

    #[allow(clippy::cast_possible_truncation)]
    fn command(&mut self, command: Command, points: &[(i32, i32)]) {
        if points.is_empty() {
            return;
        }
        self.encoded.push(command.integer(points.len() as u32));
        for &(x, y) in points {
            self.encoded.push(encode_parameter(x - self.cx));
            self.encoded.push(encode_parameter(y - self.cy));
            self.cx = x;
            self.cy = y;
        }
    }
}
