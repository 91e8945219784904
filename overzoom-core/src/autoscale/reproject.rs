use tracing::trace;

use crate::autoscale::{Resolution, SubRegion, clip_line, clip_points, clip_polygon_ring};
use crate::mvt::{Coord, Feature, GeomType, Layer, Ring, TileLayers};

/// Clip every layer of an ancestor tile to the requested tile and rescale it.
///
/// Layers are kept even if no feature survives, features are dropped as soon as
/// they have no geometry left.
#[must_use]
pub fn reproject(layers: TileLayers, resolution: &Resolution) -> TileLayers {
    layers
        .into_iter()
        .map(|(name, layer)| (name, reproject_layer(layer, resolution)))
        .collect()
}

/// Clip and rescale a single layer, see [`reproject`].
#[must_use]
pub fn reproject_layer(layer: Layer, resolution: &Resolution) -> Layer {
    let region = resolution.sub_region_for(layer.extent);
    let transform = Rescale {
        region,
        scale: resolution.scale,
        extent: f64::from(layer.extent),
    };

    let before = layer.features.len();
    let features: Vec<Feature> = layer
        .features
        .into_iter()
        .filter_map(|f| reproject_feature(f, &transform))
        .collect();
    trace!(
        "Layer {} of {:#}: kept {} of {before} features for {:#}",
        layer.name,
        resolution.ancestor,
        features.len(),
        resolution.requested
    );

    Layer { features, ..layer }
}

/// Maps ancestor extent-space into the requested tile's extent-space.
struct Rescale {
    region: SubRegion,
    scale: f64,
    extent: f64,
}

impl Rescale {
    fn apply(&self, c: Coord) -> Coord {
        Coord::new(
            ((c.x - self.region.origin_x) / self.scale).clamp(0.0, self.extent),
            ((c.y - self.region.origin_y) / self.scale).clamp(0.0, self.extent),
        )
    }

    fn apply_ring(&self, mut ring: Ring) -> Ring {
        for c in &mut ring {
            *c = self.apply(*c);
        }
        ring
    }
}

fn reproject_feature(feature: Feature, transform: &Rescale) -> Option<Feature> {
    let region = &transform.region;
    if region.is_degenerate() {
        return None;
    }

    let rings = &feature.geometry;
    let clipped: Vec<Ring> = match feature.geom_type {
        GeomType::Point => rings
            .iter()
            .map(|r| clip_points(r, region))
            .filter(|r| !r.is_empty())
            .collect(),
        GeomType::LineString => rings.iter().flat_map(|r| clip_line(r, region)).collect(),
        GeomType::Polygon => rings
            .iter()
            .filter_map(|r| clip_polygon_ring(r, region))
            .collect(),
        GeomType::Unknown => return None,
    };
    if clipped.is_empty() {
        return None;
    }

    Some(Feature {
        geometry: clipped
            .into_iter()
            .map(|r| transform.apply_ring(r))
            .collect(),
        ..feature
    })
}
