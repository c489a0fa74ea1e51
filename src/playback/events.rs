use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Weak;
use tracing::{info, warn};

use super::coordinator::CoordinatorHandle;
use super::host::{HostPlayer, PlaybackEvents};

/// What to do when the host cannot play an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Move on to the next queued item.
    Skip,
    /// End the session.
    Stop,
}

/// Bridges host player callbacks to the coordinator.
///
/// Holds the player weakly: the player owns this adapter once registered.
pub struct PlayerEventAdapter {
    coordinator: CoordinatorHandle,
    player: Weak<dyn HostPlayer>,
    policy: ErrorPolicy,
    max_consecutive_errors: usize,
    consecutive_errors: AtomicUsize,
}

impl PlayerEventAdapter {
    pub fn new(coordinator: CoordinatorHandle, player: Weak<dyn HostPlayer>) -> Self {
        Self {
            coordinator,
            player,
            policy: ErrorPolicy::Skip,
            max_consecutive_errors: 10,
            consecutive_errors: AtomicUsize::new(0),
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Give up once this many items in a row fail to play. Zero disables the limit.
    pub fn with_max_consecutive_errors(mut self, limit: usize) -> Self {
        self.max_consecutive_errors = limit;
        self
    }

    pub fn consecutive_errors(&self) -> usize {
        self.consecutive_errors.load(Ordering::Relaxed)
    }
}

impl PlaybackEvents for PlayerEventAdapter {
    fn on_playback_stopped(&self) {
        info!("Host reported playback stopped");
        self.coordinator.stop();
    }

    fn on_playback_error(&self) {
        let errors = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
        warn!("Host reported a playback error ({} in a row)", errors);

        if self.policy == ErrorPolicy::Stop {
            self.coordinator.stop();
            return;
        }
        if self.max_consecutive_errors > 0 && errors >= self.max_consecutive_errors {
            warn!("{} items failed in a row, stopping playback", errors);
            self.coordinator.stop();
            return;
        }

        match self.player.upgrade() {
            Some(player) => {
                if let Err(e) = player.play_next() {
                    warn!("Could not skip to next item: {}", e);
                }
            }
            None => self.coordinator.stop(),
        }
    }

    fn on_playback_ended(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }
}
