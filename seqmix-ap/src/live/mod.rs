//! Live playback
//!
//! The scheduler drives an output graph incrementally: each segment gets a
//! gain bus with scheduled fade ramps, a foreground source and its tiled
//! background loops. Deferred work (crossfade starts, segment ends,
//! missing-asset skips) carries the session id it was armed in and is
//! discarded when that session is gone.

pub mod diagnostics;
pub mod driver;
pub mod graph;
pub mod pump;
pub mod recording;
pub mod scheduler;
pub mod software;
pub mod timers;

pub use driver::{spawn_scheduler, Command, SchedulerHandle};
pub use graph::{AudioGraph, Destination, GainRamp, NodeId};
pub use recording::{GraphCall, RecordingGraph};
pub use scheduler::LiveScheduler;
pub use software::{SharedGraph, SoftwareGraph};
