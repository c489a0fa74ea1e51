// Playback side - everything that talks to the host player
// The coordinator is the only thing that writes the host queue

pub mod command;     // host that runs an external program per item
pub mod coordinator; // tick loop reconciling the queue with the playlist model
pub mod events;      // host callbacks routed back to the coordinator
pub mod host;        // traits a host player implements

pub use command::CommandPlayer;
pub use coordinator::{
    CoordinatorHandle, CoordinatorReport, CoordinatorSettings, CoordinatorState,
    PlaybackCoordinator,
};
pub use events::{ErrorPolicy, PlayerEventAdapter};
pub use host::{HostPlayer, PlaybackEvents};
