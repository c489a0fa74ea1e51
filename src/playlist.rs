// Shared playlist model - the scanner appends, the coordinator reads and adopts
// Everything goes through one mutex so two threads never see half an update

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::media::DiscoveredItem;

/// A play order produced by [`PlaylistModel::generate_sequence`].
///
/// The first `played_len` entries are the already-consumed part of the previously
/// adopted order, unchanged. The rest is a fresh shuffle of everything not yet played
/// in the current pass over the collection.
#[derive(Debug, Clone)]
pub struct GeneratedSequence {
    items: Vec<Arc<DiscoveredItem>>,
    indices: Vec<usize>,
    played_len: usize,
    pass_start: usize,
    source_count: usize,
    generated_at: DateTime<Utc>,
}

impl GeneratedSequence {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Arc<DiscoveredItem>] {
        &self.items
    }

    /// Length of the preserved prefix.
    pub fn played_len(&self) -> usize {
        self.played_len
    }

    /// Item count of the model when this sequence was generated.
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Whether the shuffled part restarts the whole collection.
    pub fn starts_new_pass(&self) -> bool {
        self.pass_start == self.played_len && self.played_len > 0
    }
}

#[derive(Debug, Default)]
struct PlaylistState {
    items: Vec<Arc<DiscoveredItem>>,
    // Order most recently installed in the player, as indices into `items`
    handed_out: Vec<usize>,
    // Where the current pass over the collection begins inside `handed_out`
    pass_start: usize,
    watermark: Option<usize>,
    last_update: Option<DateTime<Utc>>,
}

/// Thread-safe, append-only record of discovered items plus the played watermark.
#[derive(Debug)]
pub struct PlaylistModel {
    state: Mutex<PlaylistState>,
    repeat: bool,
}

impl PlaylistModel {
    pub fn new() -> Self {
        Self::with_repeat(true)
    }

    /// `repeat` lets a new shuffled pass start once every item has been played.
    pub fn with_repeat(repeat: bool) -> Self {
        Self {
            state: Mutex::new(PlaylistState::default()),
            repeat,
        }
    }

    fn state(&self) -> MutexGuard<'_, PlaylistState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a discovery. Returns the new item count.
    pub fn add_item(&self, item: DiscoveredItem) -> usize {
        let mut state = self.state();
        debug!("Appended item: {}", item.path().display());
        state.items.push(Arc::new(item));
        state.last_update = Some(Utc::now());
        state.items.len()
    }

    /// Raise the watermark to `observed` if it is further than anything seen before.
    ///
    /// Positions outside the adopted order are ignored, so a queue that loops back or
    /// gets seeked backwards never lowers the watermark.
    pub fn update_watermark(&self, observed: usize) -> bool {
        let mut state = self.state();
        if observed >= state.handed_out.len() {
            return false;
        }
        if state.watermark.map_or(true, |current| observed > current) {
            state.watermark = Some(observed);
            info!("Updated last played index: {}", observed);
            return true;
        }
        false
    }

    pub fn watermark(&self) -> Option<usize> {
        self.state().watermark
    }

    pub fn item_count(&self) -> usize {
        self.state().items.len()
    }

    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.state().last_update
    }

    /// Length of the order currently handed out to the player.
    pub fn handed_out_len(&self) -> usize {
        self.state().handed_out.len()
    }

    /// Build the next play order: played prefix verbatim, then a shuffle of the rest.
    pub fn generate_sequence(&self) -> GeneratedSequence {
        let state = self.state();
        let mut rng = rand::thread_rng();

        let played_len = state.watermark.map_or(0, |w| w + 1);
        let prefix = &state.handed_out[..played_len];

        let mut played_this_pass = vec![false; state.items.len()];
        for &index in &prefix[state.pass_start.min(played_len)..] {
            played_this_pass[index] = true;
        }

        let mut pass_start = state.pass_start;
        let mut remainder: Vec<usize> = (0..state.items.len())
            .filter(|&index| !played_this_pass[index])
            .collect();

        if remainder.is_empty() && self.repeat && !state.items.is_empty() && played_len > 0 {
            // Whole collection played: start the next pass after the prefix
            pass_start = played_len;
            remainder = (0..state.items.len()).collect();
            remainder.shuffle(&mut rng);
            if remainder.len() > 1 && prefix.last() == remainder.first() {
                let swap_with = rng.gen_range(1..remainder.len());
                remainder.swap(0, swap_with);
            }
            info!("Collection exhausted, starting a new pass of {} items", remainder.len());
        } else {
            remainder.shuffle(&mut rng);
        }

        let indices: Vec<usize> = prefix.iter().copied().chain(remainder).collect();
        let items = indices
            .iter()
            .map(|&index| Arc::clone(&state.items[index]))
            .collect();

        debug!(
            "Generated sequence of size {} from played {} and all {}",
            indices.len(),
            played_len,
            state.items.len()
        );

        GeneratedSequence {
            items,
            indices,
            played_len,
            pass_start,
            source_count: state.items.len(),
            generated_at: Utc::now(),
        }
    }

    /// Record `sequence` as the order now installed in the player.
    ///
    /// Must be called with a sequence generated since the last watermark change.
    pub fn adopt(&self, sequence: &GeneratedSequence) {
        let mut state = self.state();
        debug_assert_eq!(
            sequence.played_len,
            state.watermark.map_or(0, |w| w + 1),
            "adopted sequence was generated against an older watermark"
        );
        state.handed_out = sequence.indices.clone();
        state.pass_start = sequence.pass_start;
        state.last_update = Some(Utc::now());
        debug!("Adopted sequence of size {}", sequence.len());
    }

    pub fn clear(&self) {
        info!("Clearing playlist");
        *self.state() = PlaylistState::default();
    }
}

impl Default for PlaylistModel {
    fn default() -> Self {
        Self::new()
    }
}
