// shufflecast - endless shuffled playback over a folder that is still being scanned
// Scanner feeds the playlist, the coordinator keeps the player's queue topped up

pub mod config;   // settings and preferences
pub mod error;    // library error type
pub mod logging;  // tracing subscriber setup for the binaries
pub mod media;    // discovered items, directory access, the scanner
pub mod playback; // host player traits, coordinator, event adapter
pub mod playlist; // shared playlist model
pub mod session;  // wires one scan + one playback run together

// Export the stuff the binaries actually use
pub use config::Config;
pub use error::{Result, ShuffleError};
pub use media::{DiscoveredItem, DiscoveryScanner, ScanProgress, ScanReport};
pub use playback::{CommandPlayer, HostPlayer, PlaybackCoordinator, PlaybackEvents};
pub use playlist::{GeneratedSequence, PlaylistModel};
pub use session::{Session, SessionReport};
