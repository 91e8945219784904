use std::env;

use clap::Parser;
use log::{Level, log_enabled};
use overzoom::{OverzoomError, OverzoomResult};
use overzoom::config::args::Args;
use overzoom::config::env::OsEnv;
use overzoom::config::file::{Config, read_config};
use overzoom::logging::{ensure_core_log_level_matches, init_tracing};
use overzoom::render::{RenderOptions, render_tiles};
use overzoom_core::Overzoom;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start(args: Args, cancel: CancellationToken) -> OverzoomResult<()> {
    info!("Starting overzoom v{VERSION}");

    let save_config = args.meta.save_config.clone();
    let mut config = if let Some(ref cfg_filename) = args.meta.config {
        info!("Using {}", cfg_filename.display());
        read_config(cfg_filename, &OsEnv)?
    } else {
        Config::default()
    };

    let tiles = args.merge_into_config(&mut config)?;
    config.finalize()?;

    if let Some(file_name) = save_config {
        config.save_to_file(file_name.as_path())?;
    } else {
        info!("Use --save-config to save or print the configuration.");
    }
    if tiles.is_empty() {
        return Err(OverzoomError::NoTiles);
    }

    let overzoom = Overzoom::new(config.resolve_source()?)
        .with_cache(config.tile_cache())
        .with_autoscale(config.autoscale.unwrap_or_default());
    let header = overzoom.header().await?;
    info!(
        "Archive {} has {} tiles for zoom {}..={}, autoscale is {}",
        config.archive.as_deref().unwrap_or_default(),
        header.tile_info,
        header.min_zoom,
        header.max_zoom,
        overzoom.autoscale()
    );

    let options = RenderOptions {
        format: config.format.unwrap_or_default(),
        output: config.output.clone(),
        concurrency: config.concurrency(),
    };
    render_tiles(&overzoom, &tiles, &options, &cancel).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = ensure_core_log_level_matches(env::var("RUST_LOG").ok(), "overzoom=");
    if let Err(e) = init_tracing(&filter, env::var("OVERZOOM_FORMAT").ok()) {
        eprintln!("{e}");
    }

    let args = Args::parse();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending tiles");
            on_ctrl_c.cancel();
        }
    });

    if let Err(e) = start(args, cancel).await {
        // Ensure the message is printed, even if the logging is disabled
        if log_enabled!(Level::Error) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}
