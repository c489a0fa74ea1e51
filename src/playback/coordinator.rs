use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::host::HostPlayer;
use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::playlist::{GeneratedSequence, PlaylistModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No queue installed yet.
    AwaitingSeed,
    /// Player active on a non-empty queue.
    Playing,
    /// Queue populated but the player is not running.
    IdleNonEmptyQueue,
    /// Terminal.
    Stopped,
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub tick_interval: Duration,
    pub seed_poll_interval: Duration,
    pub min_start_items: usize,
    pub staleness_window: Option<Duration>,
    pub idle_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(playback: &PlaybackConfig, recursive: bool) -> Self {
        Self {
            tick_interval: playback.tick_interval(),
            seed_poll_interval: playback.seed_poll_interval(),
            min_start_items: playback.min_start_items(recursive),
            staleness_window: playback.staleness_window(),
            idle_timeout: playback.idle_timeout(),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default(), false)
    }
}

/// Cloneable stop switch for a running coordinator. Safe to call from any thread.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    stop: CancellationToken,
}

impl CoordinatorHandle {
    pub fn new(stop: CancellationToken) -> Self {
        Self { stop }
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub ticks: u64,
    pub replacements: usize,
    pub seeded: bool,
}

/// Keeps the host queue in step with the playlist model, one tick at a time.
///
/// The only writer of the host queue. Once stopped it clears the queue and cannot
/// be restarted.
pub struct PlaybackCoordinator {
    model: Arc<PlaylistModel>,
    player: Arc<dyn HostPlayer>,
    settings: CoordinatorSettings,
    stop: CancellationToken,
    // Cancelled once the discovery pass is over and no more items will arrive
    scan_done: CancellationToken,
    state: CoordinatorState,
    // Item count and time of the last generation, for staleness checks
    generated_count: usize,
    generated_at: Option<chrono::DateTime<Utc>>,
    // Queue position/size the last extension check ran against
    last_checked: Option<(usize, usize)>,
    idle_since: Option<Instant>,
    idle_stop_sent: bool,
    report: CoordinatorReport,
}

impl PlaybackCoordinator {
    /// `stop` ends the loop when cancelled; pass a child of the session abort token.
    pub fn new(
        model: Arc<PlaylistModel>,
        player: Arc<dyn HostPlayer>,
        settings: CoordinatorSettings,
        stop: CancellationToken,
    ) -> Self {
        Self {
            model,
            player,
            settings,
            stop,
            scan_done: CancellationToken::new(),
            state: CoordinatorState::AwaitingSeed,
            generated_count: 0,
            generated_at: None,
            last_checked: None,
            idle_since: None,
            idle_stop_sent: false,
            report: CoordinatorReport::default(),
        }
    }

    /// Token the session cancels when scanning ends.
    ///
    /// After that the start minimum no longer applies: whatever was found gets played,
    /// and a scan that found nothing stops the coordinator.
    pub fn with_scan_done(mut self, scan_done: CancellationToken) -> Self {
        self.scan_done = scan_done;
        self
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.stop.clone())
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Tick until stopped, then clear the host queue.
    pub async fn run(mut self) -> CoordinatorReport {
        info!(
            "Playback coordinator started (waiting for {} items)",
            self.settings.min_start_items
        );

        while !self.stop.is_cancelled() {
            if let Err(e) = self.tick() {
                error!("Playback coordinator error: {}", e);
            }

            let wait = match self.state {
                CoordinatorState::AwaitingSeed => self.settings.seed_poll_interval,
                _ => self.settings.tick_interval,
            };
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.shutdown();
        self.report
    }

    /// One reconciliation pass against the host.
    pub fn tick(&mut self) -> Result<()> {
        if self.stop.is_cancelled() {
            return Ok(());
        }
        self.report.ticks += 1;

        match self.state {
            CoordinatorState::AwaitingSeed => self.try_seed(),
            CoordinatorState::Playing | CoordinatorState::IdleNonEmptyQueue => {
                let size = self.player.queue_size();
                if size == 0 {
                    info!("Host queue is empty, waiting to seed again");
                    self.enter_awaiting_seed();
                    return Ok(());
                }

                if self.player.is_active() {
                    if self.state == CoordinatorState::IdleNonEmptyQueue {
                        info!("Player active again, resuming");
                    }
                    self.state = CoordinatorState::Playing;
                    self.idle_since = None;
                    self.idle_stop_sent = false;
                    self.reconcile(size)
                } else {
                    self.handle_idle(size);
                    Ok(())
                }
            }
            CoordinatorState::Stopped => Ok(()),
        }
    }

    fn try_seed(&mut self) -> Result<()> {
        // Read before the count: once the scan is done the count is final
        let scan_finished = self.scan_done.is_cancelled();
        let count = self.model.item_count();
        if count < self.settings.min_start_items {
            if !scan_finished {
                debug!(
                    "Waiting for items: {}/{}",
                    count, self.settings.min_start_items
                );
                return Ok(());
            }
            if count == 0 {
                warn!("Scan finished without any playable items, stopping");
                self.stop.cancel();
                return Ok(());
            }
            info!(
                "Scan finished with {} of {} items, starting anyway",
                count, self.settings.min_start_items
            );
        }

        let sequence = self.model.generate_sequence();
        self.note_generated(&sequence);

        // Resume after anything already played when re-seeding
        let start = sequence.played_len();
        if start >= sequence.len() {
            debug!("Nothing left to seed with ({} items)", sequence.len());
            return Ok(());
        }

        self.player.replace_queue(sequence.items());
        self.model.adopt(&sequence);
        self.player.play(start)?;

        info!(
            "Seeded queue with {} items, playing from {}",
            sequence.len(),
            start
        );
        self.state = CoordinatorState::Playing;
        self.report.seeded = true;
        Ok(())
    }

    fn reconcile(&mut self, size: usize) -> Result<()> {
        let Some(position) = self.player.queue_position() else {
            return Ok(());
        };

        let watermark_behind = self.model.watermark().map_or(true, |w| w < position);
        let near_end =
            position + 2 >= size && self.last_checked != Some((position, size));
        let discovered = self.model.item_count() > self.generated_count;
        let stale = match (self.settings.staleness_window, self.generated_at) {
            (Some(window), Some(at)) => (Utc::now() - at)
                .to_std()
                .map_or(false, |elapsed| elapsed > window),
            _ => false,
        };

        if !(watermark_behind || near_end || discovered || stale) {
            return Ok(());
        }

        self.last_checked = Some((position, size));
        self.model.update_watermark(position);
        let sequence = self.model.generate_sequence();
        self.note_generated(&sequence);

        // Never shrink or restart a queue the player is part way through
        if sequence.len() > size {
            self.player.replace_queue(sequence.items());
            self.model.adopt(&sequence);
            self.report.replacements += 1;
            info!(
                "Replaced queue: {} -> {} items at position {}",
                size,
                sequence.len(),
                position
            );
        } else {
            debug!(
                "Kept queue of {} items (generated {}) at position {}",
                size,
                sequence.len(),
                position
            );
        }
        Ok(())
    }

    fn handle_idle(&mut self, size: usize) {
        if self.state != CoordinatorState::IdleNonEmptyQueue {
            warn!("Player is not active with {} items queued", size);
            self.state = CoordinatorState::IdleNonEmptyQueue;
        }

        let since = *self.idle_since.get_or_insert_with(Instant::now);
        if !self.idle_stop_sent && since.elapsed() >= self.settings.idle_timeout {
            warn!("Player idle for {:?}, requesting stop", since.elapsed());
            self.idle_stop_sent = true;
            self.player.stop();
        }
    }

    fn enter_awaiting_seed(&mut self) {
        self.state = CoordinatorState::AwaitingSeed;
        self.last_checked = None;
        self.idle_since = None;
        self.idle_stop_sent = false;
    }

    fn note_generated(&mut self, sequence: &GeneratedSequence) {
        self.generated_count = sequence.source_count();
        self.generated_at = Some(sequence.generated_at());
    }

    fn shutdown(&mut self) {
        self.state = CoordinatorState::Stopped;
        self.player.queue_clear();
        info!(
            "Playback coordinator stopped after {} ticks, {} replacements",
            self.report.ticks, self.report.replacements
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShuffleError;
    use crate::media::DiscoveredItem;
    use crate::playback::PlaybackEvents;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Host double: tests move the position and flip activity by hand.
    #[derive(Default)]
    struct ScriptedPlayer {
        inner: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        queue: Vec<PathBuf>,
        position: Option<usize>,
        active: bool,
        fail_play: bool,
        fail_next_plays: usize,
        installs: Vec<usize>,
        plays: Vec<usize>,
        stops: usize,
    }

    impl ScriptedPlayer {
        fn set_position(&self, position: usize) {
            self.inner.lock().unwrap().position = Some(position);
        }
        fn set_active(&self, active: bool) {
            self.inner.lock().unwrap().active = active;
        }
        fn queue(&self) -> Vec<PathBuf> {
            self.inner.lock().unwrap().queue.clone()
        }
        fn installs(&self) -> Vec<usize> {
            self.inner.lock().unwrap().installs.clone()
        }
    }

    impl HostPlayer for ScriptedPlayer {
        fn queue_size(&self) -> usize {
            self.inner.lock().unwrap().queue.len()
        }
        fn queue_position(&self) -> Option<usize> {
            self.inner.lock().unwrap().position
        }
        fn queue_clear(&self) {
            let mut inner = self.inner.lock().unwrap();
            inner.queue.clear();
        }
        fn queue_append(&self, item: Arc<DiscoveredItem>) {
            self.inner
                .lock()
                .unwrap()
                .queue
                .push(item.path().to_path_buf());
        }
        fn replace_queue(&self, items: &[Arc<DiscoveredItem>]) {
            let mut inner = self.inner.lock().unwrap();
            inner.queue = items.iter().map(|i| i.path().to_path_buf()).collect();
            let len = inner.queue.len();
            inner.installs.push(len);
        }
        fn is_active(&self) -> bool {
            self.inner.lock().unwrap().active
        }
        fn play(&self, start: usize) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_play || inner.fail_next_plays > 0 {
                inner.fail_next_plays = inner.fail_next_plays.saturating_sub(1);
                return Err(ShuffleError::Player("no output".to_string()));
            }
            inner.position = Some(start);
            inner.active = true;
            inner.plays.push(start);
            Ok(())
        }
        fn play_next(&self) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.position = inner.position.map(|p| p + 1);
            Ok(())
        }
        fn stop(&self) {
            let mut inner = self.inner.lock().unwrap();
            inner.active = false;
            inner.stops += 1;
        }
        fn register_events(&self, _handler: Arc<dyn PlaybackEvents>) {}
    }

    fn model_with(count: usize) -> Arc<PlaylistModel> {
        let model = Arc::new(PlaylistModel::new());
        for i in 0..count {
            model.add_item(DiscoveredItem::new(PathBuf::from(format!("/m/{}.mkv", i))));
        }
        model
    }

    fn coordinator(
        model: &Arc<PlaylistModel>,
        player: &Arc<ScriptedPlayer>,
        settings: CoordinatorSettings,
    ) -> PlaybackCoordinator {
        PlaybackCoordinator::new(
            Arc::clone(model),
            player.clone(),
            settings,
            CancellationToken::new(),
        )
    }

    fn settings(min_start_items: usize) -> CoordinatorSettings {
        CoordinatorSettings {
            tick_interval: Duration::from_millis(10),
            seed_poll_interval: Duration::from_millis(5),
            min_start_items,
            staleness_window: None,
            idle_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_waits_for_minimum_items_before_seeding() {
        let model = model_with(2);
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(3));

        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::AwaitingSeed);
        assert!(player.queue().is_empty());

        model.add_item(DiscoveredItem::new(PathBuf::from("/m/late.mkv")));
        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::Playing);
        assert_eq!(player.queue().len(), 3);
        assert_eq!(player.inner.lock().unwrap().plays, vec![0]);
    }

    #[test]
    fn test_finished_scan_seeds_below_minimum() {
        let model = model_with(2);
        let player = Arc::new(ScriptedPlayer::default());
        let scan_done = CancellationToken::new();
        let mut coord =
            coordinator(&model, &player, settings(3)).with_scan_done(scan_done.clone());

        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::AwaitingSeed);

        scan_done.cancel();
        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::Playing);
        assert_eq!(player.installs(), vec![2]);
    }

    #[test]
    fn test_finished_scan_without_items_stops() {
        let model = Arc::new(PlaylistModel::new());
        let player = Arc::new(ScriptedPlayer::default());
        let scan_done = CancellationToken::new();
        scan_done.cancel();
        let mut coord =
            coordinator(&model, &player, settings(3)).with_scan_done(scan_done);
        let handle = coord.handle();

        coord.tick().unwrap();
        assert!(handle.is_stopped());
        assert!(player.installs().is_empty());
    }

    #[test]
    fn test_empty_model_is_never_installed() {
        let model = Arc::new(PlaylistModel::new());
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(0));

        coord.tick().unwrap();
        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::AwaitingSeed);
        assert!(player.installs().is_empty());
        assert!(player.inner.lock().unwrap().plays.is_empty());
    }

    #[test]
    fn test_same_length_sequence_does_not_replace_queue() {
        let model = model_with(7);
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(1));

        coord.tick().unwrap();
        let seeded = player.queue();
        assert_eq!(seeded.len(), 7);

        // Stop short of the last slot, which would start the next pass
        for position in 1..6 {
            player.set_position(position);
            coord.tick().unwrap();
            assert_eq!(player.queue(), seeded);
        }
        assert_eq!(player.installs(), vec![7]);
        assert_eq!(model.watermark(), Some(5));
    }

    #[test]
    fn test_new_discoveries_extend_queue_without_touching_played_prefix() {
        let model = model_with(5);
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(1));

        coord.tick().unwrap();
        let seeded = player.queue();

        player.set_position(4);
        model.add_item(DiscoveredItem::new(PathBuf::from("/m/new1.mkv")));
        model.add_item(DiscoveredItem::new(PathBuf::from("/m/new2.mkv")));
        coord.tick().unwrap();

        let queue = player.queue();
        assert_eq!(queue.len(), 7);
        assert_eq!(queue[..5], seeded[..]);
        assert_eq!(model.watermark(), Some(4));
        assert_eq!(player.installs(), vec![5, 7]);
    }

    #[test]
    fn test_installed_queue_length_only_grows() {
        let model = model_with(3);
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(1));
        coord.tick().unwrap();

        for step in 0..20 {
            if step % 3 == 0 {
                model.add_item(DiscoveredItem::new(PathBuf::from(format!("/m/s{}.mkv", step))));
            }
            let size = player.queue().len();
            player.set_position((step / 2).min(size - 1));
            coord.tick().unwrap();
        }

        let installs = player.installs();
        assert!(installs.windows(2).all(|pair| pair[1] > pair[0]));
    }

    #[test]
    fn test_last_slot_starts_a_new_pass() {
        let model = model_with(3);
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(1));
        coord.tick().unwrap();

        player.set_position(2);
        coord.tick().unwrap();
        assert_eq!(player.queue().len(), 6);
        assert_eq!(coord.report.replacements, 1);
    }

    #[test]
    fn test_quiet_tick_does_not_regenerate() {
        let model = model_with(10);
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(1));
        coord.tick().unwrap();

        coord.tick().unwrap();
        let generated_at = coord.generated_at;
        coord.tick().unwrap();
        coord.tick().unwrap();
        assert_eq!(coord.generated_at, generated_at);
    }

    #[test]
    fn test_stale_generation_is_refreshed() {
        let model = model_with(10);
        let player = Arc::new(ScriptedPlayer::default());
        let mut settings = settings(1);
        settings.staleness_window = Some(Duration::ZERO);
        let mut coord = coordinator(&model, &player, settings);
        coord.tick().unwrap();
        coord.tick().unwrap();

        let before = coord.generated_at;
        std::thread::sleep(Duration::from_millis(5));
        coord.tick().unwrap();
        assert!(coord.generated_at > before);
        assert_eq!(player.installs(), vec![10]);
    }

    #[test]
    fn test_idle_player_is_asked_to_stop_once() {
        let model = model_with(4);
        let player = Arc::new(ScriptedPlayer::default());
        let mut settings = settings(1);
        settings.idle_timeout = Duration::ZERO;
        let mut coord = coordinator(&model, &player, settings);
        coord.tick().unwrap();

        player.set_active(false);
        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::IdleNonEmptyQueue);
        coord.tick().unwrap();
        assert_eq!(player.inner.lock().unwrap().stops, 1);

        player.set_active(true);
        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::Playing);
    }

    #[test]
    fn test_cleared_host_queue_returns_to_seeding() {
        let model = model_with(4);
        let player = Arc::new(ScriptedPlayer::default());
        let mut coord = coordinator(&model, &player, settings(1));
        coord.tick().unwrap();
        player.set_position(1);
        coord.tick().unwrap();

        player.set_active(false);
        player.queue_clear();
        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::AwaitingSeed);

        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::Playing);
        // Re-seeding resumes after the two items already played
        assert_eq!(player.inner.lock().unwrap().plays, vec![0, 2]);
    }

    #[test]
    fn test_failed_play_is_retried_next_tick() {
        let model = model_with(2);
        let player = Arc::new(ScriptedPlayer::default());
        player.inner.lock().unwrap().fail_play = true;
        let mut coord = coordinator(&model, &player, settings(1));

        assert!(coord.tick().is_err());
        assert_eq!(coord.state(), CoordinatorState::AwaitingSeed);

        player.inner.lock().unwrap().fail_play = false;
        coord.tick().unwrap();
        assert_eq!(coord.state(), CoordinatorState::Playing);
    }

    #[tokio::test]
    async fn test_run_keeps_ticking_after_failed_tick() {
        let model = model_with(3);
        let player = Arc::new(ScriptedPlayer::default());
        player.inner.lock().unwrap().fail_next_plays = 1;
        let coord = coordinator(&model, &player, settings(1));
        let handle = coord.handle();

        let task = tokio::spawn(coord.run());
        let deadline = Instant::now() + Duration::from_secs(2);
        while !player.is_active() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        handle.stop();
        let report = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("coordinator did not stop")
            .unwrap();

        assert!(report.seeded);
        assert!(report.ticks >= 2);
        assert_eq!(player.inner.lock().unwrap().plays, vec![0]);
    }

    #[tokio::test]
    async fn test_stop_handle_ends_loop_and_clears_queue() {
        let model = model_with(5);
        let player = Arc::new(ScriptedPlayer::default());
        let coord = coordinator(&model, &player, settings(1));
        let handle = coord.handle();

        let task = tokio::spawn(coord.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(player.queue().len(), 5);

        handle.stop();
        let report = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("coordinator did not stop")
            .unwrap();

        assert!(report.seeded);
        assert!(report.ticks >= 1);
        assert!(player.queue().is_empty());
    }
}
