use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use approx::assert_relative_eq;
use async_trait::async_trait;
use overzoom_core::autoscale::ring_area;
use overzoom_core::mvt::{
    CodecError, Coord, Feature, GeomType, Layer, Ring, TileLayers, encode_tile,
};
use overzoom_core::tiles::{
    ArchiveHeader, OverzoomCoreError, OverzoomCoreResult, TileCache, TileSource,
};
use overzoom_core::{AutoScale, Overzoom, RenderedTile, TileOrigin, TileOutcome};
use overzoom_tile_utils::{Format, TileCoord, TileData};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const EXTENT: u32 = 4096;
const E: f64 = 4096.0;

/// An archive held in memory, counting how often it is read.
#[derive(Debug, Default)]
struct MemorySource {
    max_zoom: u8,
    tiles: HashMap<TileCoord, TileData>,
    header_gate: Option<Arc<Notify>>,
    fetch_gate: Option<Arc<Notify>>,
    fail_next_header: AtomicBool,
    cancel_on_fetch: AtomicBool,
    header_calls: AtomicUsize,
    fetches: AtomicUsize,
}

impl MemorySource {
    fn new(max_zoom: u8) -> Self {
        Self {
            max_zoom,
            ..Self::default()
        }
    }

    fn with_tile(mut self, coord: TileCoord, layers: &TileLayers) -> Self {
        self.tiles.insert(coord, encode_tile(layers));
        self
    }

    fn with_raw_tile(mut self, coord: TileCoord, data: &[u8]) -> Self {
        self.tiles.insert(coord, data.to_vec());
        self
    }

    fn with_header_gate(mut self, gate: Arc<Notify>) -> Self {
        self.header_gate = Some(gate);
        self
    }

    fn with_fetch_gate(mut self, gate: Arc<Notify>) -> Self {
        self.fetch_gate = Some(gate);
        self
    }
}

#[async_trait]
impl TileSource for MemorySource {
    fn get_id(&self) -> &str {
        "memory"
    }

    async fn get_header(&self) -> OverzoomCoreResult<ArchiveHeader> {
        self.header_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.header_gate {
            gate.notified().await;
        }
        if self.fail_next_header.swap(false, Ordering::SeqCst) {
            return Err(OverzoomCoreError::OtherError("header unavailable".into()));
        }
        Ok(ArchiveHeader {
            min_zoom: 0,
            max_zoom: self.max_zoom,
            tile_info: Format::Mvt.into(),
        })
    }

    async fn fetch(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> OverzoomCoreResult<Option<TileData>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.fetch_gate {
            gate.notified().await;
        }
        if self.cancel_on_fetch.load(Ordering::SeqCst) {
            cancel.cancel();
        }
        Ok(self.tiles.get(&coord).cloned())
    }
}

fn coord(z: u8, x: u32, y: u32) -> TileCoord {
    TileCoord { z, x, y }
}

fn ring(points: &[(f64, f64)]) -> Ring {
    points.iter().copied().map(Coord::from).collect()
}

fn square(min: f64, max: f64) -> Ring {
    ring(&[(min, min), (max, min), (max, max), (min, max)])
}

fn single_layer(features: Vec<Feature>) -> TileLayers {
    let mut layer = Layer::new("data", EXTENT);
    layer.features = features;
    TileLayers::from([(layer.name.clone(), layer)])
}

fn bbox(ring: &[Coord]) -> (f64, f64, f64, f64) {
    ring.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x0, y0, x1, y1), c| (x0.min(c.x), y0.min(c.y), x1.max(c.x), y1.max(c.y)),
    )
}

/// The only ring of the only feature must cover the whole tile.
fn assert_full_extent(tile: &RenderedTile) {
    let features = &tile.layers["data"].features;
    assert_eq!(features.len(), 1, "{tile:?}");
    let geometry = &features[0].geometry;
    assert_eq!(geometry.len(), 1);
    assert_eq!(bbox(&geometry[0]), (0.0, 0.0, E, E));
    assert_relative_eq!(ring_area(&geometry[0]).abs(), E * E);
}

async fn render<S: TileSource>(overzoom: &Overzoom<S>, c: TileCoord) -> RenderedTile {
    overzoom
        .render(c, &CancellationToken::new())
        .await
        .unwrap()
        .rendered()
        .unwrap()
}

#[rstest]
#[case::at_native(coord(14, 3, 5))]
#[case::below_native(coord(12, 1, 2))]
#[case::world(coord(0, 0, 0))]
#[tokio::test]
async fn native_zoom_passes_through(#[case] c: TileCoord) {
    let layers = single_layer(vec![
        Feature::new(GeomType::Polygon, vec![square(10.0, 500.0)]).with_property("kind", "park"),
        Feature::new(GeomType::LineString, vec![ring(&[(0.0, 0.0), (4000.0, 10.0)])]),
        Feature::new(GeomType::Point, vec![ring(&[(7.0, 9.0)])]),
    ]);
    let overzoom = Overzoom::new(MemorySource::new(14).with_tile(c, &layers));

    let tile = render(&overzoom, c).await;
    assert_eq!(tile.origin, TileOrigin::Direct);
    assert_eq!(tile.coord, c);
    assert_eq!(tile.layers, layers);
}

#[tokio::test]
async fn full_extent_polygon_two_levels_deep() {
    let layers = single_layer(vec![Feature::new(GeomType::Polygon, vec![square(0.0, E)])]);
    let overzoom = Overzoom::new(MemorySource::new(14).with_tile(coord(14, 100, 200), &layers));

    for (dx, dy) in [(0, 0), (1, 2), (3, 3)] {
        let tile = render(&overzoom, coord(16, 400 + dx, 800 + dy)).await;
        let TileOrigin::Reprojected(resolution) = &tile.origin else {
            panic!("expected a reprojected tile, got {:?}", tile.origin);
        };
        assert_eq!(resolution.ancestor, coord(14, 100, 200));
        assert_eq!(resolution.delta_zoom, 2);
        assert_full_extent(&tile);
    }
}

#[rstest]
#[case::one_level(11, 1)]
#[case::two_levels(12, 3)]
#[tokio::test]
async fn quadrant_polygon(#[case] z: u8, #[case] far: u32) {
    let layers = single_layer(vec![Feature::new(
        GeomType::Polygon,
        vec![square(0.0, E / 2.0)],
    )]);
    let overzoom = Overzoom::new(MemorySource::new(10).with_tile(coord(10, 0, 0), &layers));

    assert_full_extent(&render(&overzoom, coord(z, 0, 0)).await);

    let opposite = render(&overzoom, coord(z, far, far)).await;
    assert!(opposite.layers["data"].features.is_empty());
}

#[tokio::test]
async fn quadrant_polygon_touching_siblings_are_empty() {
    let layers = single_layer(vec![Feature::new(
        GeomType::Polygon,
        vec![square(0.0, E / 2.0)],
    )]);
    let overzoom = Overzoom::new(MemorySource::new(10).with_tile(coord(10, 0, 0), &layers));

    for sibling in [coord(11, 1, 0), coord(11, 0, 1), coord(11, 1, 1)] {
        let tile = render(&overzoom, sibling).await;
        assert!(tile.layers["data"].features.is_empty(), "{sibling:#}");
    }
}

#[tokio::test]
async fn reprojected_coordinates_stay_within_extent() {
    let layers = single_layer(vec![
        Feature::new(
            GeomType::Polygon,
            vec![ring(&[(-64.0, 100.0), (4100.0, 30.0), (2000.0, 4160.0)])],
        ),
        Feature::new(
            GeomType::LineString,
            vec![ring(&[(0.0, 0.0), (4096.0, 4096.0), (0.0, 4096.0), (3000.0, 7.0)])],
        ),
        Feature::new(
            GeomType::Point,
            (0..64)
                .map(|i| ring(&[(f64::from(i) * 64.0, f64::from(63 - i) * 64.0)]))
                .collect(),
        ),
    ]);
    let overzoom = Overzoom::new(MemorySource::new(5).with_tile(coord(5, 9, 9), &layers));

    for x in 0..8 {
        for y in 0..8 {
            let tile = render(&overzoom, coord(8, 72 + x, 72 + y)).await;
            for feature in &tile.layers["data"].features {
                for c in feature.coords() {
                    assert!((0.0..=E).contains(&c.x) && (0.0..=E).contains(&c.y), "{c:?}");
                }
            }
        }
    }
}

#[tokio::test]
async fn repeated_renders_are_identical() {
    let layers = single_layer(vec![Feature::new(
        GeomType::Polygon,
        vec![ring(&[(100.0, 100.0), (3900.0, 700.0), (1200.0, 3500.0)])],
    )]);
    let overzoom = Overzoom::new(MemorySource::new(3).with_tile(coord(3, 1, 1), &layers));

    let first = render(&overzoom, coord(6, 10, 13)).await;
    let second = render(&overzoom, coord(6, 10, 13)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn out_of_range_coordinate_is_an_error() {
    let overzoom = Overzoom::new(MemorySource::new(14));
    let result = overzoom
        .render(coord(2, 4, 0), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(OverzoomCoreError::ResolveError(_))));
    assert_eq!(overzoom.source().header_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn absent_tiles_render_empty() {
    let overzoom = Overzoom::new(MemorySource::new(14));
    let direct = render(&overzoom, coord(3, 1, 1)).await;
    assert!(direct.layers.is_empty());
    let deep = render(&overzoom, coord(17, 1, 1)).await;
    assert!(deep.layers.is_empty());
    assert!(matches!(deep.origin, TileOrigin::Reprojected(_)));
}

#[tokio::test]
async fn malformed_tile_is_an_error() {
    let source = MemorySource::new(2).with_raw_tile(coord(2, 1, 1), b"\xff\xff\xff\xff");
    let overzoom = Overzoom::new(source);
    let result = overzoom
        .render(coord(4, 5, 5), &CancellationToken::new())
        .await;
    assert!(matches!(
        result,
        Err(OverzoomCoreError::CodecError(CodecError::Protobuf(_)))
    ));
}

#[tokio::test]
async fn cancelled_request_produces_nothing() {
    let overzoom = Overzoom::new(MemorySource::new(14));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = overzoom.render(coord(16, 0, 0), &cancel).await.unwrap();
    assert_eq!(outcome, TileOutcome::Cancelled);
    assert_eq!(overzoom.source().fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn requests_wait_for_the_header() {
    let gate = Arc::new(Notify::new());
    let layers = single_layer(vec![Feature::new(GeomType::Polygon, vec![square(0.0, E)])]);
    let source = MemorySource::new(1)
        .with_tile(coord(1, 0, 1), &layers)
        .with_header_gate(Arc::clone(&gate));
    let overzoom = Arc::new(Overzoom::new(source));

    let tasks: Vec<_> = [coord(1, 0, 1), coord(3, 1, 5)]
        .into_iter()
        .map(|c| {
            let overzoom = Arc::clone(&overzoom);
            tokio::spawn(async move { overzoom.render(c, &CancellationToken::new()).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(tasks.iter().all(|t| !t.is_finished()));
    assert_eq!(overzoom.source().fetches.load(Ordering::SeqCst), 0);

    gate.notify_one();
    for task in tasks {
        let tile = task.await.unwrap().unwrap().rendered().unwrap();
        assert_full_extent(&tile);
    }
    assert_eq!(overzoom.source().header_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_while_waiting_for_header() {
    let gate = Arc::new(Notify::new());
    let overzoom = Arc::new(Overzoom::new(
        MemorySource::new(14).with_header_gate(Arc::clone(&gate)),
    ));
    let cancel = CancellationToken::new();

    let task = {
        let overzoom = Arc::clone(&overzoom);
        let cancel = cancel.clone();
        tokio::spawn(async move { overzoom.render(coord(15, 0, 0), &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap().unwrap(), TileOutcome::Cancelled);
    assert_eq!(overzoom.source().fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_while_fetching() {
    let gate = Arc::new(Notify::new());
    let layers = single_layer(vec![Feature::new(GeomType::Polygon, vec![square(0.0, E)])]);
    let source = MemorySource::new(10)
        .with_tile(coord(10, 0, 0), &layers)
        .with_fetch_gate(Arc::clone(&gate));
    let overzoom = Arc::new(Overzoom::new(source));
    let cancel = CancellationToken::new();

    let task = {
        let overzoom = Arc::clone(&overzoom);
        let cancel = cancel.clone();
        tokio::spawn(async move { overzoom.render(coord(12, 0, 0), &cancel).await })
    };
    while overzoom.source().fetches.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!task.is_finished());
    cancel.cancel();

    assert_eq!(task.await.unwrap().unwrap(), TileOutcome::Cancelled);
    assert_eq!(overzoom.source().fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_during_fetch_skips_decode() {
    let source = MemorySource::new(2).with_raw_tile(coord(2, 1, 1), b"\xff\xff\xff\xff");
    source.cancel_on_fetch.store(true, Ordering::SeqCst);
    let overzoom = Overzoom::new(source);
    let cancel = CancellationToken::new();

    // malformed bytes would fail to decode if decoding were attempted
    let outcome = overzoom.render(coord(4, 5, 5), &cancel).await.unwrap();
    assert_eq!(outcome, TileOutcome::Cancelled);
    assert!(cancel.is_cancelled());
    assert_eq!(overzoom.source().fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_header_is_retried() {
    let source = MemorySource::new(14);
    source.fail_next_header.store(true, Ordering::SeqCst);
    let overzoom = Overzoom::new(source);

    assert!(
        overzoom
            .render(coord(15, 0, 0), &CancellationToken::new())
            .await
            .is_err()
    );
    render(&overzoom, coord(15, 0, 0)).await;
    assert_eq!(overzoom.header().await.unwrap().max_zoom, 14);
    assert_eq!(overzoom.source().header_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn delegate_mode_returns_ancestor() {
    let layers = single_layer(vec![Feature::new(
        GeomType::Polygon,
        vec![square(0.0, E / 2.0)],
    )]);
    let overzoom = Overzoom::new(MemorySource::new(10).with_tile(coord(10, 0, 0), &layers))
        .with_autoscale(AutoScale::Delegate);

    let tile = render(&overzoom, coord(12, 3, 3)).await;
    let TileOrigin::Delegated(resolution) = &tile.origin else {
        panic!("expected a delegated tile, got {:?}", tile.origin);
    };
    assert_eq!(resolution.ancestor, coord(10, 0, 0));
    assert_eq!(tile.coord, coord(12, 3, 3));
    assert_eq!(tile.layers, layers);
}

#[tokio::test]
async fn off_mode_fetches_requested_tile() {
    let layers = single_layer(vec![Feature::new(GeomType::Polygon, vec![square(0.0, E)])]);
    let overzoom = Overzoom::new(MemorySource::new(10).with_tile(coord(10, 0, 0), &layers))
        .with_autoscale(AutoScale::Off);

    let tile = render(&overzoom, coord(11, 0, 0)).await;
    assert_eq!(tile.origin, TileOrigin::Direct);
    assert!(tile.layers.is_empty());
}

#[tokio::test]
async fn siblings_share_one_cached_fetch() {
    let layers = single_layer(vec![Feature::new(GeomType::Polygon, vec![square(0.0, E)])]);
    let overzoom = Overzoom::new(MemorySource::new(10).with_tile(coord(10, 4, 4), &layers))
        .with_cache(Some(TileCache::new(1_000_000, None, None)));

    let descendants = [
        coord(11, 8, 8),
        coord(11, 9, 8),
        coord(11, 8, 9),
        coord(11, 9, 9),
        coord(12, 17, 17),
    ];
    for c in descendants {
        assert_full_extent(&render(&overzoom, c).await);
    }
    assert_eq!(overzoom.source().fetches.load(Ordering::SeqCst), 1);
}
