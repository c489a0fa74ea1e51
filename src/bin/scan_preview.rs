// Quick check of what the scanner picks up, without playing anything

use clap::Parser;
use shufflecast::media::{DiscoveryScanner, LocalFilesystem};
use shufflecast::{PlaylistModel, ScanProgress};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "scan_preview")]
#[command(about = "List the playable items shufflecast would find in a folder")]
struct Args {
    /// Folder to scan
    root: PathBuf,

    /// Only look at files directly inside the folder
    #[arg(long)]
    no_recursive: bool,

    /// Stop printing items after this many (the scan still runs to the end)
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("Scanning {}", args.root.display());
    println!("============================");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let model = Arc::new(PlaylistModel::new());
    let scanner = DiscoveryScanner::new(
        Arc::new(LocalFilesystem),
        Arc::clone(&model),
        CancellationToken::new(),
    )
    .with_recursive(!args.no_recursive)
    .with_fatal_backoff(std::time::Duration::ZERO)
    .with_progress(tx);

    let root = args.root.clone();
    let scan = tokio::task::spawn_blocking(move || scanner.run(&root));

    while let Some(progress) = rx.recv().await {
        match progress {
            ScanProgress::Started { root } => println!("Walking {}", root.display()),
            ScanProgress::ItemFound { item, total } => {
                if total <= args.limit {
                    println!("{}. {}", total, item.label());
                    if let Some(art) = item.artwork() {
                        println!("   Artwork: {}", art.display());
                    }
                } else if total == args.limit + 1 {
                    println!("... (more items not shown)");
                }
            }
            ScanProgress::DirectorySkipped { path, error } => {
                println!("Skipped {}: {}", path.display(), error);
            }
            ScanProgress::Completed { .. } => {}
        }
    }

    let report = scan.await?;
    println!();
    println!("Items found:          {}", report.items_found);
    println!("Directories visited:  {}", report.directories_visited);
    println!("Directories skipped:  {}", report.directories_skipped);
    println!("In playlist model:    {}", model.item_count());

    Ok(())
}
