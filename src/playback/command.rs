use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::host::{HostPlayer, PlaybackEvents};
use crate::error::{Result, ShuffleError};
use crate::media::DiscoveredItem;

const CHILD_POLL: Duration = Duration::from_millis(100);

/// Host player that keeps its queue in-process and plays each item by running an
/// external program (`<command> <args...> <path>`).
///
/// A zero exit status counts as the item ending normally; anything else, including
/// a failed launch, is reported as a playback error.
pub struct CommandPlayer {
    command: String,
    args: Vec<String>,
    shared: Arc<Shared>,
}

struct Shared {
    queue: Mutex<QueueState>,
    events: Mutex<Option<Arc<dyn PlaybackEvents>>>,
}

#[derive(Default)]
struct QueueState {
    items: Vec<Arc<DiscoveredItem>>,
    position: Option<usize>,
    active: bool,
    skip_requested: bool,
    stop_requested: bool,
}

enum ItemOutcome {
    Finished,
    Failed,
    Interrupted,
}

enum WorkerExit {
    Stopped,
    EndOfQueue,
    Failed,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handler(&self) -> Option<Arc<dyn PlaybackEvents>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandPlayer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState::default()),
                events: Mutex::new(None),
            }),
        }
    }

    /// Start the playback thread unless one is already running.
    fn ensure_worker(&self, queue: &mut QueueState) -> Result<()> {
        if queue.active {
            return Ok(());
        }
        queue.active = true;
        queue.stop_requested = false;
        queue.skip_requested = false;

        let worker = Worker {
            command: self.command.clone(),
            args: self.args.clone(),
            shared: Arc::clone(&self.shared),
        };
        thread::Builder::new()
            .name("command-player".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                queue.active = false;
                ShuffleError::Player(format!("failed to start playback thread: {}", e))
            })?;
        Ok(())
    }
}

impl HostPlayer for CommandPlayer {
    fn queue_size(&self) -> usize {
        self.shared.queue().items.len()
    }

    fn queue_position(&self) -> Option<usize> {
        let queue = self.shared.queue();
        queue.position.filter(|&p| p < queue.items.len())
    }

    fn queue_clear(&self) {
        let mut queue = self.shared.queue();
        queue.items.clear();
        queue.position = None;
    }

    fn queue_append(&self, item: Arc<DiscoveredItem>) {
        self.shared.queue().items.push(item);
    }

    fn replace_queue(&self, items: &[Arc<DiscoveredItem>]) {
        // Single lock: the playback thread sees either the old queue or the new one
        let mut queue = self.shared.queue();
        queue.items = items.to_vec();
    }

    fn is_active(&self) -> bool {
        self.shared.queue().active
    }

    fn play(&self, start: usize) -> Result<()> {
        let mut queue = self.shared.queue();
        if start >= queue.items.len() {
            return Err(ShuffleError::Player(format!(
                "cannot start at {} in a queue of {}",
                start,
                queue.items.len()
            )));
        }
        queue.position = Some(start);
        if queue.active {
            queue.skip_requested = true;
            return Ok(());
        }
        self.ensure_worker(&mut queue)
    }

    fn play_next(&self) -> Result<()> {
        let mut queue = self.shared.queue();
        let next = queue.position.map_or(0, |p| p + 1);
        queue.position = Some(next);
        if queue.active {
            queue.skip_requested = true;
            return Ok(());
        }
        if next < queue.items.len() {
            self.ensure_worker(&mut queue)?;
        }
        Ok(())
    }

    fn stop(&self) {
        let was_active = {
            let mut queue = self.shared.queue();
            queue.stop_requested = true;
            queue.active
        };
        // A running worker reports the stop itself once its child is gone
        if !was_active {
            if let Some(handler) = self.shared.handler() {
                handler.on_playback_stopped();
            }
        }
    }

    fn register_events(&self, handler: Arc<dyn PlaybackEvents>) {
        *self
            .shared
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        self.shared.queue().stop_requested = true;
    }
}

struct Worker {
    command: String,
    args: Vec<String>,
    shared: Arc<Shared>,
}

impl Worker {
    fn run(self) {
        debug!("Command player thread started");
        let exit = loop {
            let (index, item) = {
                let mut queue = self.shared.queue();
                if queue.stop_requested {
                    queue.active = false;
                    break WorkerExit::Stopped;
                }
                let current = queue
                    .position
                    .and_then(|p| queue.items.get(p).map(|item| (p, Arc::clone(item))));
                match current {
                    Some(current) => {
                        queue.skip_requested = false;
                        current
                    }
                    None => {
                        queue.active = false;
                        break WorkerExit::EndOfQueue;
                    }
                }
            };

            info!("Playing [{}] {}", index, item.label());
            match self.play_item(&item) {
                ItemOutcome::Interrupted => continue,
                ItemOutcome::Finished => {
                    {
                        let mut queue = self.shared.queue();
                        if queue.position == Some(index) {
                            queue.position = Some(index + 1);
                        }
                    }
                    if let Some(handler) = self.shared.handler() {
                        handler.on_playback_ended();
                    }
                }
                ItemOutcome::Failed => {
                    if let Some(handler) = self.shared.handler() {
                        handler.on_playback_error();
                    }
                    let mut queue = self.shared.queue();
                    let moved_on = queue.position != Some(index)
                        || queue.skip_requested
                        || queue.stop_requested;
                    if !moved_on {
                        queue.active = false;
                        break WorkerExit::Failed;
                    }
                }
            }
        };

        match exit {
            WorkerExit::EndOfQueue => info!("Reached end of queue"),
            WorkerExit::Stopped | WorkerExit::Failed => {
                info!("Command player stopped");
                if let Some(handler) = self.shared.handler() {
                    handler.on_playback_stopped();
                }
            }
        }
    }

    fn play_item(&self, item: &DiscoveredItem) -> ItemOutcome {
        let mut child = match Command::new(&self.command)
            .args(&self.args)
            .arg(item.path())
            .stdin(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                let e = ShuffleError::PlayerLaunch {
                    command: self.command.clone(),
                    source,
                };
                error!("{}", e);
                return ItemOutcome::Failed;
            }
        };

        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return ItemOutcome::Finished,
                Ok(Some(status)) => {
                    warn!("Failed to play {}: {}", item.path().display(), status);
                    return ItemOutcome::Failed;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Lost track of player for {}: {}", item.path().display(), e);
                    kill(&mut child);
                    return ItemOutcome::Failed;
                }
            }

            let interrupt = {
                let queue = self.shared.queue();
                queue.stop_requested || queue.skip_requested
            };
            if interrupt {
                kill(&mut child);
                return ItemOutcome::Interrupted;
            }
            thread::sleep(CHILD_POLL);
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
