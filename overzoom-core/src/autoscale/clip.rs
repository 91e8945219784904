//! Clipping of extent-space geometry against an axis-aligned square.
//!
//! Both routines apply the four half-planes `x >= min_x`, `x <= max_x`,
//! `y >= min_y`, `y <= max_y` one after another. Polygon rings use
//! Sutherland-Hodgman and stay a single ring. Lines may be split into several
//! parts when they leave and re-enter the square.

use crate::autoscale::SubRegion;
use crate::mvt::{Coord, Ring};

#[derive(Debug, Clone, Copy)]
enum HalfPlane {
    MinX(f64),
    MaxX(f64),
    MinY(f64),
    MaxY(f64),
}

impl HalfPlane {
    fn all(region: &SubRegion) -> [Self; 4] {
        [
            Self::MinX(region.min_x()),
            Self::MaxX(region.max_x()),
            Self::MinY(region.min_y()),
            Self::MaxY(region.max_y()),
        ]
    }

    fn inside(self, c: Coord) -> bool {
        match self {
            Self::MinX(v) => c.x >= v,
            Self::MaxX(v) => c.x <= v,
            Self::MinY(v) => c.y >= v,
            Self::MaxY(v) => c.y <= v,
        }
    }

    /// Intersection of segment `a`-`b` with the boundary line.
    ///
    /// Only called when `a` and `b` are on opposite sides, so the segment is never
    /// parallel to the boundary. The clipped axis is set exactly to the boundary.
    fn intersect(self, a: Coord, b: Coord) -> Coord {
        match self {
            Self::MinX(v) | Self::MaxX(v) => {
                let t = (v - a.x) / (b.x - a.x);
                Coord::new(v, a.y + t * (b.y - a.y))
            }
            Self::MinY(v) | Self::MaxY(v) => {
                let t = (v - a.y) / (b.y - a.y);
                Coord::new(a.x + t * (b.x - a.x), v)
            }
        }
    }
}

/// Keep the points that lie inside `region`, edges included.
#[must_use]
pub fn clip_points(ring: &[Coord], region: &SubRegion) -> Ring {
    ring.iter().copied().filter(|c| region.contains(*c)).collect()
}

/// Clip a closed polygon ring to `region`.
///
/// Returns `None` when nothing with a non-zero area is left.
#[must_use]
pub fn clip_polygon_ring(ring: &[Coord], region: &SubRegion) -> Option<Ring> {
    let ring = match ring {
        [first, inner @ .., last] if first == last => &ring[..=inner.len()],
        _ => ring,
    };
    if ring.len() < 3 || region.is_degenerate() {
        return None;
    }

    let mut input: Ring = ring.to_vec();
    let mut output: Ring = Vec::with_capacity(ring.len() + 4);
    for edge in HalfPlane::all(region) {
        output.clear();
        let Some(&last) = input.last() else {
            return None;
        };
        let mut prev = last;
        for &cur in &input {
            let cur_in = edge.inside(cur);
            if cur_in != edge.inside(prev) {
                output.push(edge.intersect(prev, cur));
            }
            if cur_in {
                output.push(cur);
            }
            prev = cur;
        }
        std::mem::swap(&mut input, &mut output);
    }

    input.dedup();
    while input.len() > 1 && input.first() == input.last() {
        input.pop();
    }
    // area tolerance is relative to the region, which can be tiny at deep zooms
    let min_area = f64::EPSILON * region.side * region.side;
    (input.len() >= 3 && ring_area(&input).abs() > min_area).then_some(input)
}

/// Clip a line to `region`, one output part per continuous run inside it.
#[must_use]
pub fn clip_line(line: &[Coord], region: &SubRegion) -> Vec<Ring> {
    if line.len() < 2 || region.is_degenerate() {
        return Vec::new();
    }

    let mut parts = vec![line.to_vec()];
    for edge in HalfPlane::all(region) {
        let mut clipped = Vec::with_capacity(parts.len());
        for part in &parts {
            clip_line_half_plane(part, edge, &mut clipped);
        }
        parts = clipped;
    }

    for part in &mut parts {
        part.dedup();
    }
    parts.retain(|p| p.len() >= 2);
    parts
}

fn clip_line_half_plane(line: &[Coord], edge: HalfPlane, out: &mut Vec<Ring>) {
    let mut current: Ring = Vec::new();
    let mut prev: Option<(Coord, bool)> = None;
    for &cur in line {
        let cur_in = edge.inside(cur);
        match prev {
            None if cur_in => current.push(cur),
            Some((p, true)) if !cur_in => {
                current.push(edge.intersect(p, cur));
                out.push(std::mem::take(&mut current));
            }
            Some((p, false)) if cur_in => {
                current.push(edge.intersect(p, cur));
                current.push(cur);
            }
            Some((_, true)) => current.push(cur),
            None | Some((_, false)) => {}
        }
        prev = Some((cur, cur_in));
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Signed shoelace area, positive for clockwise rings in a y-down tile space.
#[must_use]
pub fn ring_area(ring: &[Coord]) -> f64 {
    let (Some(&first), Some(&last)) = (ring.first(), ring.last()) else {
        return 0.0;
    };
    // relative to the first vertex, so rings far from the origin keep their precision
    let local = |c: Coord| (c.x - first.x, c.y - first.y);
    let mut prev = local(last);
    let mut sum = 0.0;
    for &cur in ring {
        let cur = local(cur);
        sum += prev.0 * cur.1 - cur.0 * prev.1;
        prev = cur;
    }
    sum / 2.0
}
