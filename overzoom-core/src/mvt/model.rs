use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A point in a tile's extent-space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// An ordered sequence of points.
///
/// Point features hold one point per ring. Polygon rings are implicitly closed,
/// the first vertex is not repeated at the end.
pub type Ring = Vec<Coord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeomType {
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl GeomType {
    /// Maps the MVT wire value of `Feature.type`.
    #[must_use]
    pub fn from_mvt(value: i32) -> Self {
        match value {
            1 => Self::Point,
            2 => Self::LineString,
            3 => Self::Polygon,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn to_mvt(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Point => 1,
            Self::LineString => 2,
            Self::Polygon => 3,
        }
    }
}

/// A typed feature attribute, mirroring the value kinds a vector tile can store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    Float(f32),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub geom_type: GeomType,
    pub geometry: Vec<Ring>,
    #[serde(default)]
    pub properties: Properties,
}

impl Feature {
    #[must_use]
    pub fn new(geom_type: GeomType, geometry: Vec<Ring>) -> Self {
        Self {
            id: None,
            geom_type,
            geometry,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// True when the feature has no rings, or only empty ones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.iter().all(Vec::is_empty)
    }

    /// Iterates over every vertex of every ring.
    pub fn coords(&self) -> impl Iterator<Item = &Coord> {
        self.geometry.iter().flatten()
    }
}

/// A named collection of features sharing one extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub extent: u32,
    pub version: u32,
    pub features: Vec<Feature>,
}

impl Layer {
    #[must_use]
    pub fn new(name: impl Into<String>, extent: u32) -> Self {
        Self {
            name: name.into(),
            extent,
            version: 2,
            features: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }
}

/// All layers of one tile, keyed by layer name.
pub type TileLayers = BTreeMap<String, Layer>;
