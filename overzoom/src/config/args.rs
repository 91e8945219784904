use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use overzoom_core::AutoScale;
use overzoom_tile_utils::TileCoord;

use crate::OverzoomError::ConfigAndArchiveError;
use crate::OverzoomResult;
use crate::config::file::Config;
use crate::render::OutputFormat;

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug, PartialEq, Default)]
#[command(
    about,
    version,
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=overzoom=debug. Use OVERZOOM_FORMAT to pick the log format: compact, full, pretty or json.",
    styles = HELP_STYLES
)]
pub struct Args {
    #[command(flatten)]
    pub meta: MetaArgs,
    #[command(flatten)]
    pub render: RenderArgs,
}

// None of these params will be transferred to the config
#[derive(Parser, Debug, Clone, PartialEq, Default)]
#[command(about, version)]
pub struct MetaArgs {
    /// Path to config file. If set, the archive must be set in the config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Save resulting config to a file or use "-" to print to stdout.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
    /// Path or URL of a .pmtiles archive, e.g. `data/osm.pmtiles` or `s3://bucket/osm.pmtiles`
    pub archive: Option<String>,
    /// Tiles to render, as z/x/y
    pub tiles: Vec<TileCoord>,
}

#[derive(Parser, Debug, Clone, PartialEq, Default)]
#[command()]
pub struct RenderArgs {
    /// How tiles past the archive's max zoom are produced: geometry, delegate or off.
    #[arg(short, long)]
    pub autoscale: Option<AutoScale>,
    /// Output format of rendered tiles.
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
    /// Directory to write tiles into. Without it, tiles are printed to stdout as JSON lines.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Number of tiles rendered at the same time. Defaults to the number of CPUs.
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,
    /// Size of the raw tile cache in MB (0 to disable).
    #[arg(short = 'C', long)]
    pub cache_size: Option<u64>,
}

impl Args {
    /// Apply command line arguments on top of `config`, returning the tiles to render.
    ///
    /// With `--config`, a first positional argument that is a tile coordinate is
    /// treated as a tile, anything else is an error.
    pub fn merge_into_config(self, config: &mut Config) -> OverzoomResult<Vec<TileCoord>> {
        let mut tiles = self.meta.tiles;
        if let Some(archive) = self.meta.archive {
            if self.meta.config.is_some() {
                let Ok(tile) = archive.parse::<TileCoord>() else {
                    return Err(ConfigAndArchiveError(archive));
                };
                tiles.insert(0, tile);
            } else {
                config.archive = Some(archive);
            }
        }

        let render = self.render;
        if render.autoscale.is_some() {
            config.autoscale = render.autoscale;
        }
        if render.format.is_some() {
            config.format = render.format;
        }
        if render.output.is_some() {
            config.output = render.output;
        }
        if render.concurrency.is_some() {
            config.concurrency = render.concurrency;
        }
        if render.cache_size.is_some() {
            config.cache_size_mb = render.cache_size;
        }
        Ok(tiles)
    }
}
