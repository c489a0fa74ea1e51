use std::sync::Arc;

use crate::error::Result;
use crate::media::DiscoveredItem;

/// Callbacks a host player fires from its own threads.
///
/// Implementations must return quickly: set a flag or call a thread-safe method,
/// never block.
pub trait PlaybackEvents: Send + Sync {
    /// Playback was stopped; the session should wind down.
    fn on_playback_stopped(&self);

    /// The current item could not be opened or failed mid-play.
    fn on_playback_error(&self);

    /// The current item played to its end.
    fn on_playback_ended(&self) {}
}

/// The host player and its queue, as seen by the coordinator.
///
/// Queries are expected to be cheap and non-blocking.
pub trait HostPlayer: Send + Sync {
    fn queue_size(&self) -> usize;

    /// Index of the item currently playing (or about to play), if any.
    fn queue_position(&self) -> Option<usize>;

    fn queue_clear(&self);

    fn queue_append(&self, item: Arc<DiscoveredItem>);

    /// Swap the whole queue for `items` without touching the item in flight.
    ///
    /// The default clears then appends one by one; hosts that can expose a partially
    /// filled queue to their playback thread should override this and do both under
    /// one lock.
    fn replace_queue(&self, items: &[Arc<DiscoveredItem>]) {
        self.queue_clear();
        for item in items {
            self.queue_append(Arc::clone(item));
        }
    }

    fn is_active(&self) -> bool;

    /// Start playing the queue at `start`.
    fn play(&self, start: usize) -> Result<()>;

    /// Abandon the current item and move on to the next queued one.
    fn play_next(&self) -> Result<()>;

    /// Stop playback. Hosts report it through [`PlaybackEvents::on_playback_stopped`].
    fn stop(&self);

    fn register_events(&self, handler: Arc<dyn PlaybackEvents>);
}
