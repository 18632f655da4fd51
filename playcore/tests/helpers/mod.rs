//! Test helper modules for playcore integration tests
//!
//! Provides reusable test infrastructure components:
//! - TestPlayer: a player wired to the simulated pipeline, the static DRM
//!   gate and a channel of outbound events
//! - Sample builders for clear and encrypted media
//! - ControlledPipeline: asynchronous state changes over the simulated pipeline

#![allow(dead_code)]

pub mod controlled_pipeline;
pub mod samples;
pub mod test_player;

pub use controlled_pipeline::ControlledPipeline;
pub use samples::{audio, encrypted_video, video, TEST_SESSION};
pub use test_player::{test_config, wait_until, TestPlayer, EVENT_TIMEOUT};
