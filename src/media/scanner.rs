use super::item::FOLDER_ART_NAME;
use super::{DirectorySource, DiscoveredItem, ExtensionFilter};
use crate::error::{Result, ShuffleError};
use crate::playlist::PlaylistModel;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub enum ScanProgress {
    Started { root: PathBuf },
    ItemFound { item: DiscoveredItem, total: usize },
    DirectorySkipped { path: PathBuf, error: String },
    Completed { report: ScanReport },
}

/// Summary of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub directories_visited: usize,
    pub directories_skipped: usize,
    pub items_found: usize,
    pub cancelled: bool,
}

enum Pending {
    Directory(PathBuf),
    File(PathBuf),
}

/// Walks a media tree once, feeding every playable file into the playlist model.
pub struct DiscoveryScanner {
    source: Arc<dyn DirectorySource>,
    model: Arc<PlaylistModel>,
    filter: ExtensionFilter,
    recursive: bool,
    fatal_backoff: Duration,
    abort: CancellationToken,
    progress: Option<mpsc::UnboundedSender<ScanProgress>>,
}

impl DiscoveryScanner {
    pub fn new(
        source: Arc<dyn DirectorySource>,
        model: Arc<PlaylistModel>,
        abort: CancellationToken,
    ) -> Self {
        Self {
            source,
            model,
            filter: ExtensionFilter::default(),
            recursive: true,
            fatal_backoff: Duration::from_secs(10),
            abort,
            progress: None,
        }
    }

    pub fn with_filter(mut self, filter: ExtensionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Only look at the root directory itself when `false`.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Pause after a fatal walk error before the pass gives up.
    pub fn with_fatal_backoff(mut self, backoff: Duration) -> Self {
        self.fatal_backoff = backoff;
        self
    }

    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<ScanProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run one discovery pass. Blocks on directory I/O; run it off the async runtime.
    ///
    /// Errors that escape the walk are logged and end the pass after the backoff; the
    /// pass is never restarted.
    pub fn run(&self, root: &Path) -> ScanReport {
        info!("Scanner started: {}", root.display());
        self.emit(ScanProgress::Started {
            root: root.to_path_buf(),
        });

        let mut report = ScanReport::default();
        match self.scan(root, &mut report) {
            Ok(()) => {}
            Err(ShuffleError::Cancelled) => {
                info!("Scanner cancelled after {} items", report.items_found);
                report.cancelled = true;
            }
            Err(e) => {
                error!("Scanner error: {}", e);
                if self.wait_for_abort(self.fatal_backoff) {
                    report.cancelled = true;
                }
            }
        }

        info!(
            "Scanner stopped: {} items in {} directories ({} skipped)",
            report.items_found, report.directories_visited, report.directories_skipped
        );
        self.emit(ScanProgress::Completed {
            report: report.clone(),
        });
        report
    }

    fn scan(&self, root: &Path, report: &mut ScanReport) -> Result<()> {
        if !self.source.path_exists(root) {
            return Err(ShuffleError::RootMissing(root.to_path_buf()));
        }
        let root = self
            .source
            .resolve_canonical_path(root)
            .map_err(|source| ShuffleError::Canonicalize {
                path: root.to_path_buf(),
                source,
            })?;

        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut stack = vec![Pending::Directory(root)];
        let mut rng = rand::thread_rng();

        // Children are pushed in reverse shuffled order, so popping walks them
        // depth-first in shuffled order
        while let Some(next) = stack.pop() {
            match next {
                Pending::File(path) => self.discover(path, report),
                Pending::Directory(dir) => {
                    if self.abort.is_cancelled() {
                        return Err(ShuffleError::Cancelled);
                    }
                    let Some(mut children) = self.expand(&dir, &mut visited, report) else {
                        continue;
                    };
                    if self.abort.is_cancelled() {
                        return Err(ShuffleError::Cancelled);
                    }

                    children.shuffle(&mut rng);
                    stack.extend(
                        children
                            .into_iter()
                            .rev()
                            .filter(|child| self.recursive || matches!(child, Pending::File(_))),
                    );
                }
            }
        }

        Ok(())
    }

    /// List `dir` unless its canonical form was already visited this pass.
    fn expand(
        &self,
        dir: &Path,
        visited: &mut HashSet<PathBuf>,
        report: &mut ScanReport,
    ) -> Option<Vec<Pending>> {
        let canonical = match self.source.resolve_canonical_path(dir) {
            Ok(path) => path,
            Err(source) => {
                let e = ShuffleError::Canonicalize {
                    path: dir.to_path_buf(),
                    source,
                };
                self.skip(dir, &e, report);
                return None;
            }
        };
        if !visited.insert(canonical.clone()) {
            debug!("Already visited {}, skipping", canonical.display());
            return None;
        }

        let listing = match self.source.list_directory(&canonical) {
            Ok(listing) => listing,
            Err(source) => {
                let e = ShuffleError::Enumeration {
                    path: dir.to_path_buf(),
                    source,
                };
                self.skip(dir, &e, report);
                return None;
            }
        };
        report.directories_visited += 1;

        // Keep the path the user sees; only the visited set uses canonical forms
        let rebase = |child: PathBuf| match child.file_name() {
            Some(name) => dir.join(name),
            None => child,
        };

        Some(
            listing
                .subdirs
                .into_iter()
                .map(|child| Pending::Directory(rebase(child)))
                .chain(
                    listing
                        .files
                        .into_iter()
                        .map(|child| Pending::File(rebase(child))),
                )
                .collect(),
        )
    }

    fn discover(&self, path: PathBuf, report: &mut ScanReport) {
        if !self.filter.is_playable(&path) {
            return;
        }

        let mut item = DiscoveredItem::new(path);
        if let Some(folder) = item.path().parent() {
            let art = folder.join(FOLDER_ART_NAME);
            if self.source.path_exists(&art) {
                item = item.with_artwork(art);
            }
        }

        let total = self.model.add_item(item.clone());
        report.items_found += 1;
        self.emit(ScanProgress::ItemFound { item, total });
    }

    fn skip(&self, dir: &Path, error: &ShuffleError, report: &mut ScanReport) {
        warn!("Skipping subtree, {}", error);
        report.directories_skipped += 1;
        self.emit(ScanProgress::DirectorySkipped {
            path: dir.to_path_buf(),
            error: error.to_string(),
        });
    }

    /// Sleep up to `duration`, returning early (and `true`) if abort is signalled.
    fn wait_for_abort(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.abort.is_cancelled() {
                return true;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(left.min(Duration::from_millis(100)));
        }
        self.abort.is_cancelled()
    }

    fn emit(&self, progress: ScanProgress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(progress);
        }
    }
}
