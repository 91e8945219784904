//! Rendering a batch of tiles and writing them out.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use futures::StreamExt as _;
use futures::stream;
use overzoom_core::mvt::{TileCodec, encode_tile};
use overzoom_core::tiles::TileSource;
use overzoom_core::{Overzoom, RenderedTile, TileOrigin, TileOutcome};
use overzoom_tile_utils::TileCoord;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWriteExt as _, Stdout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{OverzoomError, OverzoomResult};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON document per tile, with layers and how the tile was produced.
    #[default]
    Json,
    /// Binary Mapbox Vector Tiles, uncompressed.
    Mvt,
}

impl OutputFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Mvt => "mvt",
        }
    }
}

/// Where and how rendered tiles are written.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub format: OutputFormat,
    /// Directory for `z/x/y.<ext>` files. Stdout when `None`.
    pub output: Option<PathBuf>,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rendered: usize,
    /// Rendered tiles without any feature.
    pub empty: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// Render `tiles` with at most `options.concurrency` requests in flight.
///
/// Every request gets a child of `cancel`, so cancelling it stops the whole
/// batch. Tiles that fail to render or to be written are logged and counted;
/// the batch still finishes, then reports an error if any tile failed.
pub async fn render_tiles<S: TileSource, C: TileCodec>(
    overzoom: &Overzoom<S, C>,
    tiles: &[TileCoord],
    options: &RenderOptions,
    cancel: &CancellationToken,
) -> OverzoomResult<RenderStats> {
    let mut results = stream::iter(tiles.iter().copied())
        .map(|coord| {
            let token = cancel.child_token();
            async move { (coord, overzoom.render(coord, &token).await) }
        })
        .buffer_unordered(options.concurrency.max(1));

    let mut stats = RenderStats::default();
    let mut stdout = tokio::io::stdout();
    while let Some((coord, result)) = results.next().await {
        match result {
            Ok(TileOutcome::Rendered(tile)) => {
                describe(&tile);
                let written = match &options.output {
                    Some(dir) => write_tile(dir, options.format, &tile).await,
                    None => write_json_line(&mut stdout, &tile).await,
                };
                if let Err(e) = written {
                    error!("Unable to write {coord:#}: {e}");
                    stats.failed += 1;
                    continue;
                }
                stats.rendered += 1;
                if tile.layers.values().all(|l| l.features.is_empty()) {
                    stats.empty += 1;
                }
            }
            Ok(TileOutcome::Cancelled) => {
                debug!("Rendering of {coord:#} was cancelled");
                stats.cancelled += 1;
            }
            Err(e) => {
                error!("Unable to render {coord:#}: {e}");
                stats.failed += 1;
            }
        }
    }
    stdout.flush().await?;

    info!(
        "Rendered {} tiles ({} empty), {} cancelled, {} failed",
        stats.rendered, stats.empty, stats.cancelled, stats.failed
    );
    if stats.cancelled > 0 {
        warn!("Rendering was interrupted");
    }
    if stats.failed > 0 {
        return Err(OverzoomError::RenderFailures(stats.failed, tiles.len()));
    }
    Ok(stats)
}

fn describe(tile: &RenderedTile) {
    let features: usize = tile.layers.values().map(|l| l.features.len()).sum();
    match &tile.origin {
        TileOrigin::Direct => debug!("{:#}: {features} features", tile.coord),
        TileOrigin::Reprojected(res) => debug!(
            "{:#}: {features} features reprojected from {:#}",
            tile.coord, res.ancestor
        ),
        TileOrigin::Delegated(res) => debug!(
            "{:#}: {features} features of {:#}, to be scaled by the renderer",
            tile.coord, res.ancestor
        ),
    }
}

/// File a tile is written to inside `dir`.
#[must_use]
pub fn tile_path(dir: &Path, format: OutputFormat, coord: TileCoord) -> PathBuf {
    dir.join(coord.z.to_string())
        .join(coord.x.to_string())
        .join(format!("{}.{}", coord.y, format.extension()))
}

async fn write_json_line(stdout: &mut Stdout, tile: &RenderedTile) -> OverzoomResult<()> {
    let mut line = serde_json::to_vec(tile)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    Ok(())
}

async fn write_tile(dir: &Path, format: OutputFormat, tile: &RenderedTile) -> OverzoomResult<()> {
    let path = tile_path(dir, format, tile.coord);
    let data = match format {
        OutputFormat::Json => serde_json::to_vec_pretty(tile)?,
        OutputFormat::Mvt => encode_tile(&tile.layers),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| OverzoomError::WriteError(e, parent.to_path_buf()))?;
    }
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| OverzoomError::WriteError(e, path.clone()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_paths() {
        let coord = TileCoord { z: 15, x: 17_001, y: 11_002 };
        assert_eq!(
            tile_path(Path::new("out"), OutputFormat::Mvt, coord),
            Path::new("out/15/17001/11002.mvt")
        );
        assert_eq!(
            tile_path(Path::new("out"), OutputFormat::Json, coord),
            Path::new("out/15/17001/11002.json")
        );
    }
}
