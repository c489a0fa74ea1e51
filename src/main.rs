// shufflecast - point it at a folder, get endless shuffled playback
// Playback starts as soon as a few items turn up, the rest gets folded in while it plays

use anyhow::{Context, Result};
use clap::Parser;
use shufflecast::logging::init_logging;
use shufflecast::{CommandPlayer, Config, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "shufflecast")]
#[command(about = "Shuffled, continuous playback of a media folder while it is still being scanned")]
struct Args {
    /// Folder to scan and play
    root: PathBuf,

    /// Use this config file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Items to discover before playback starts
    #[arg(long)]
    min_start: Option<usize>,

    /// Coordinator tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Program launched for each item (the path is appended as the last argument)
    #[arg(long)]
    player: Option<String>,

    /// Only play files directly inside the root folder
    #[arg(long)]
    no_recursive: bool,

    /// Development mode - also log to stderr
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(min_start) = args.min_start {
        config.playback.min_start_items = Some(min_start);
    }
    if let Some(tick_ms) = args.tick_ms {
        config.playback.tick_interval_ms = tick_ms;
    }
    if let Some(player) = args.player {
        config.player.command = player;
        config.player.args.clear();
    }
    if args.no_recursive {
        config.scanner.recursive = false;
    }

    let _log_guard = init_logging(&config.logging.directory, args.dev)
        .context("failed to set up logging")?;
    info!("shufflecast starting up");

    let player = Arc::new(CommandPlayer::new(
        config.player.command.clone(),
        config.player.args.clone(),
    ));
    let session = Session::new(config, player);

    let abort = CancellationToken::new();
    {
        let abort = abort.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, shutting down");
                    abort.cancel();
                }
                Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
            }
        });
    }

    println!("Playing {} (Ctrl-C to quit)", args.root.display());
    let report = session
        .run(&args.root, abort)
        .await
        .with_context(|| format!("playback of {} failed", args.root.display()))?;

    println!();
    println!("Items discovered:     {}", report.items_discovered);
    println!("Directories scanned:  {}", report.scan.directories_visited);
    println!("Directories skipped:  {}", report.scan.directories_skipped);
    println!("Queue replacements:   {}", report.playback.replacements);
    if !report.playback.seeded {
        println!("Playback never started - no playable files found");
    }

    Ok(())
}
