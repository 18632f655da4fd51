//! # playcore
//!
//! Playback engine core for a platform media player:
//! - Playback state machine (initial preroll, seek preroll, presenting)
//! - Needs-data / has-enough flow control towards the media engine
//! - DRM-gated pending sample queue with ordered replay
//! - Buffer-health watchdog with internal pause/resume
//! - Per-player control thread serializing pipeline events and callbacks
//!
//! The platform pipeline and the DRM system are collaborators behind the
//! [`Pipeline`] and [`DrmGate`] traits; [`sim`] provides in-memory versions
//! of both.

pub mod callbacks;
pub mod config;
pub mod drm;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod playback;
pub mod registry;
pub mod sim;

pub use callbacks::{ChannelCallbacks, PlayerCallbacks};
pub use config::PlayerConfig;
pub use drm::{DrmGate, KeyObserverRegistry, KeyReadyObserver, SessionId};
pub use error::{Error, Result};
pub use media::{AudioCodec, Bounds, Codecs, EncodedSample, EncryptionInfo, KeyId, VideoCodec};
pub use pipeline::{BusSender, ErrorDomain, Pipeline, PipelineMessage, PipelineState, SecureMemory};
pub use playback::{PlaybackState, Player, PlayerBuilder, PlayerInfo};
pub use registry::PlayerRegistry;

pub use playcore_common::events::{DecoderState, PlayerErrorKind, PlayerEvent, PlayerState};
pub use playcore_common::{MediaTime, PerStream, StreamFlags, StreamType};
