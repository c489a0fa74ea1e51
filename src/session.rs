// One playback session over one root folder
// Scanner and coordinator start together; playback begins while the scan is still running

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, ShuffleError};
use crate::media::{DirectorySource, DiscoveryScanner, ExtensionFilter, LocalFilesystem, ScanReport};
use crate::playback::{
    CoordinatorReport, CoordinatorSettings, HostPlayer, PlaybackCoordinator, PlayerEventAdapter,
};
use crate::playlist::PlaylistModel;

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub scan: ScanReport,
    pub playback: CoordinatorReport,
    pub items_discovered: usize,
}

pub struct Session {
    config: Config,
    player: Arc<dyn HostPlayer>,
    source: Arc<dyn DirectorySource>,
}

impl Session {
    pub fn new(config: Config, player: Arc<dyn HostPlayer>) -> Self {
        Self {
            config,
            player,
            source: Arc::new(LocalFilesystem),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn DirectorySource>) -> Self {
        self.source = source;
        self
    }

    /// Scan `root` and keep the player fed until playback stops or `abort` fires.
    ///
    /// The playlist lives only for this call; each session scans from scratch.
    pub async fn run(&self, root: &Path, abort: CancellationToken) -> Result<SessionReport> {
        if root.as_os_str().is_empty() {
            return Err(ShuffleError::RootMissing(root.to_path_buf()));
        }
        info!("Starting session for {}", root.display());

        let scanner_config = &self.config.scanner;
        let model = Arc::new(PlaylistModel::with_repeat(self.config.playback.repeat));

        let scan_abort = abort.child_token();
        let scanner = DiscoveryScanner::new(
            Arc::clone(&self.source),
            Arc::clone(&model),
            scan_abort.clone(),
        )
        .with_filter(ExtensionFilter::new(&scanner_config.extensions))
        .with_recursive(scanner_config.recursive)
        .with_fatal_backoff(scanner_config.fatal_backoff());
        let scan_root = root.to_path_buf();
        let scan_done = CancellationToken::new();
        let scan_done_guard = scan_done.clone().drop_guard();
        let scan_task = tokio::task::spawn_blocking(move || {
            let _done = scan_done_guard;
            scanner.run(&scan_root)
        });

        let coordinator = PlaybackCoordinator::new(
            Arc::clone(&model),
            Arc::clone(&self.player),
            CoordinatorSettings::from_config(&self.config.playback, scanner_config.recursive),
            abort.child_token(),
        )
        .with_scan_done(scan_done);
        let adapter = PlayerEventAdapter::new(coordinator.handle(), Arc::downgrade(&self.player))
            .with_policy(self.config.player.on_error)
            .with_max_consecutive_errors(self.config.player.max_consecutive_errors);
        self.player.register_events(Arc::new(adapter));

        let playback = coordinator.run().await;

        scan_abort.cancel();
        let scan = scan_task
            .await
            .map_err(|e| ShuffleError::ScanTask(e.to_string()))?;

        if abort.is_cancelled() && self.player.is_active() {
            self.player.stop();
        }

        let items_discovered = model.item_count();
        model.clear();
        info!(
            "Session ended: {} items discovered, {} queue replacements",
            items_discovered, playback.replacements
        );

        Ok(SessionReport {
            scan,
            playback,
            items_discovered,
        })
    }
}
