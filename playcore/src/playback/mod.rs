//! Playback subsystem
//!
//! The pure building blocks (state machine, flow controller, pending queue,
//! timestamp tracker, watchdog) hold no locks and do no I/O; the engine
//! combines them under one mutex and drives the pipeline.

pub(crate) mod control;
pub mod engine;
pub mod flow;
pub mod pending;
pub mod state;
pub mod timestamps;
pub mod watchdog;

pub use engine::{Player, PlayerBuilder, PlayerInfo};
pub use pending::PendingKey;
pub use state::PlaybackState;
