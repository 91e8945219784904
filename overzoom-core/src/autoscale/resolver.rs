use overzoom_tile_utils::TileCoord;
use serde::Serialize;

use crate::autoscale::ResolveError;
use crate::mvt::Coord;

/// The square of an ancestor tile's extent-space covered by one descendant tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubRegion {
    pub origin_x: f64,
    pub origin_y: f64,
    pub side: f64,
}

impl SubRegion {
    #[must_use]
    pub fn min_x(&self) -> f64 {
        self.origin_x
    }

    #[must_use]
    pub fn min_y(&self) -> f64 {
        self.origin_y
    }

    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.origin_x + self.side
    }

    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.origin_y + self.side
    }

    /// Inclusive on all four edges.
    #[must_use]
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.min_x() && c.x <= self.max_x() && c.y >= self.min_y() && c.y <= self.max_y()
    }

    /// A region that collapsed to a point (or worse) covers nothing.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.side > 0.0 && self.side.is_finite())
    }
}

/// Where a too-deep tile comes from inside its native-zoom ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolution {
    /// The tile that was asked for.
    pub requested: TileCoord,
    /// The tile at native max zoom that contains `requested`.
    pub ancestor: TileCoord,
    /// `requested.z - ancestor.z`, always positive.
    pub delta_zoom: u8,
    /// Fraction of one ancestor side covered by the requested tile, `1 / 2^delta_zoom`.
    pub scale: f64,
    /// Extent `sub_region` was computed for.
    pub extent: u32,
    pub sub_region: SubRegion,
}

impl Resolution {
    /// Column and row of the requested tile among all descendants of the ancestor.
    #[must_use]
    pub fn sibling_index(&self) -> (u64, u64) {
        (
            sibling(self.requested.x, self.delta_zoom),
            sibling(self.requested.y, self.delta_zoom),
        )
    }

    /// The sub-region for a layer whose extent differs from [`Resolution::extent`].
    #[must_use]
    pub fn sub_region_for(&self, extent: u32) -> SubRegion {
        if extent == self.extent {
            return self.sub_region;
        }
        let (col, row) = self.sibling_index();
        sub_region(col, row, extent, self.scale)
    }
}

fn ancestor(v: u32, delta_zoom: u8) -> u32 {
    v.checked_shr(u32::from(delta_zoom)).unwrap_or(0)
}

fn sibling(v: u32, delta_zoom: u8) -> u64 {
    if delta_zoom >= 32 {
        u64::from(v)
    } else {
        u64::from(v) & ((1_u64 << delta_zoom) - 1)
    }
}

#[allow(clippy::cast_precision_loss)]
fn sub_region(col: u64, row: u64, extent: u32, scale: f64) -> SubRegion {
    let side = f64::from(extent) * scale;
    SubRegion {
        origin_x: col as f64 * side,
        origin_y: row as f64 * side,
        side,
    }
}

/// Find the native-zoom ancestor of `requested` and the part of it `requested` covers.
///
/// Only valid for tiles deeper than `native_max_zoom`; shallower tiles are served
/// directly from the archive.
pub fn resolve(
    requested: TileCoord,
    native_max_zoom: u8,
    extent: u32,
) -> Result<Resolution, ResolveError> {
    if !requested.is_valid() {
        return Err(ResolveError::InvalidCoord(requested));
    }
    if requested.z <= native_max_zoom {
        return Err(ResolveError::NotOverzoomed(requested, native_max_zoom));
    }

    let delta_zoom = requested.z - native_max_zoom;
    let scale = 0.5_f64.powi(i32::from(delta_zoom));
    let ancestor = TileCoord {
        z: native_max_zoom,
        x: ancestor(requested.x, delta_zoom),
        y: ancestor(requested.y, delta_zoom),
    };
    let sub_region = sub_region(
        sibling(requested.x, delta_zoom),
        sibling(requested.y, delta_zoom),
        extent,
        scale,
    );

    Ok(Resolution {
        requested,
        ancestor,
        delta_zoom,
        scale,
        extent,
        sub_region,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;

    const EXTENT: u32 = 4096;

    fn coord(z: u8, x: u32, y: u32) -> TileCoord {
        TileCoord { z, x, y }
    }

    #[test]
    fn two_levels_below_native() {
        // z16 tile (4*1000 + 1, 4*2000 + 3) under z14 ancestor (1000, 2000)
        let res = resolve(coord(16, 4001, 8003), 14, EXTENT).unwrap();
        assert_eq!(res.ancestor, coord(14, 1000, 2000));
        assert_eq!(res.delta_zoom, 2);
        assert_relative_eq!(res.scale, 0.25);
        assert_eq!(res.sibling_index(), (1, 3));
        assert_eq!(
            res.sub_region,
            SubRegion {
                origin_x: 1024.0,
                origin_y: 3072.0,
                side: 1024.0
            }
        );
    }

    #[rstest]
    #[case(0, 0, 0.0, 0.0)]
    #[case(1, 0, 2048.0, 0.0)]
    #[case(0, 1, 0.0, 2048.0)]
    #[case(1, 1, 2048.0, 2048.0)]
    fn one_level_below_native(
        #[case] dx: u32,
        #[case] dy: u32,
        #[case] origin_x: f64,
        #[case] origin_y: f64,
    ) {
        let res = resolve(coord(11, 2 * 300 + dx, 2 * 500 + dy), 10, EXTENT).unwrap();
        assert_eq!(res.ancestor, coord(10, 300, 500));
        assert_relative_eq!(res.scale, 0.5);
        assert_relative_eq!(res.sub_region.side, f64::from(EXTENT) / 2.0);
        assert_relative_eq!(res.sub_region.origin_x, origin_x);
        assert_relative_eq!(res.sub_region.origin_y, origin_y);
    }

    #[test]
    fn resolve_is_deterministic() {
        let requested = coord(19, 271_234, 180_777);
        assert_eq!(resolve(requested, 14, EXTENT), resolve(requested, 14, EXTENT));
    }

    #[test]
    fn sub_regions_stay_inside_ancestor() {
        let delta = 3_u8;
        let side = 1_u32 << delta;
        for x in 0..side {
            for y in 0..side {
                let res = resolve(coord(5 + delta, 8 * side + x, 3 * side + y), 5, EXTENT).unwrap();
                assert_eq!(res.ancestor, coord(5, 8, 3));
                let r = res.sub_region;
                assert!(r.min_x() >= 0.0 && r.min_y() >= 0.0);
                assert!(r.max_x() <= f64::from(EXTENT) && r.max_y() <= f64::from(EXTENT));
            }
        }
    }

    #[test]
    fn rejects_native_or_shallower_zoom() {
        assert_eq!(
            resolve(coord(14, 1, 1), 14, EXTENT),
            Err(ResolveError::NotOverzoomed(coord(14, 1, 1), 14))
        );
        assert!(resolve(coord(3, 1, 1), 14, EXTENT).is_err());
    }

    #[test]
    fn rejects_invalid_coordinate() {
        assert_eq!(
            resolve(coord(2, 4, 0), 0, EXTENT),
            Err(ResolveError::InvalidCoord(coord(2, 4, 0)))
        );
    }

    #[test]
    fn very_deep_requests_do_not_overflow() {
        let res = resolve(coord(40, u32::MAX, 7), 0, EXTENT).unwrap();
        assert_eq!(res.ancestor, coord(0, 0, 0));
        assert_eq!(res.sibling_index(), (u64::from(u32::MAX), 7));
        assert!(!res.sub_region.is_degenerate());
        assert!(res.sub_region.max_x() <= f64::from(EXTENT));
    }

    #[test]
    fn sub_region_for_other_extent() {
        let res = resolve(coord(12, 7, 5), 10, EXTENT).unwrap();
        assert_eq!(res.sub_region_for(EXTENT), res.sub_region);
        let small = res.sub_region_for(512);
        assert_relative_eq!(small.side, 128.0);
        assert_relative_eq!(small.origin_x, 3.0 * 128.0);
        assert_relative_eq!(small.origin_y, 128.0);
    }

    #[test]
    fn degenerate_region() {
        let region = SubRegion {
            origin_x: 10.0,
            origin_y: 10.0,
            side: 0.0,
        };
        assert!(region.is_degenerate());
        assert!(region.contains(Coord::new(10.0, 10.0)));
    }
}
