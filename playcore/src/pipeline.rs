//! Media pipeline contract
//!
//! The player drives a [`Pipeline`] (the platform decode/render graph) with
//! synchronous calls, and receives the pipeline's asynchronous events as
//! [`PipelineMessage`]s posted through the [`BusSender`] handed to it at
//! construction. Bus messages are handled on the player's control thread.

use crate::media::{Bounds, Codecs, EncodedSample};
use crate::playback::control::{ControlSender, ControlTask};
use playcore_common::{MediaTime, StreamType};
use std::fmt;

/// Pipeline state, ordered `Null < Ready < Paused < Playing`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Null => write!(f, "NULL"),
            PipelineState::Ready => write!(f, "READY"),
            PipelineState::Paused => write!(f, "PAUSED"),
            PipelineState::Playing => write!(f, "PLAYING"),
        }
    }
}

/// Origin of a pipeline error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDomain {
    Core,
    Library,
    Resource,
    /// Data-flow error on an elementary stream
    Stream,
}

/// Asynchronous pipeline events
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    StateChanged {
        old: PipelineState,
        new: PipelineState,
        pending: Option<PipelineState>,
    },
    /// Asynchronous state change (preroll) completed
    AsyncDone,
    EndOfStream,
    Error {
        domain: ErrorDomain,
        message: String,
    },
    ClockLost,
    Latency,
    /// Quality-of-service report with the sink's dropped frame count
    Qos {
        dropped: u64,
    },
    /// A new playback segment reached the sinks
    SegmentReceived,
    /// Stream source input wants more data
    NeedData(StreamType),
    /// Stream source input is saturated
    EnoughData(StreamType),
    /// Stream source input was repositioned
    SeekData(StreamType),
    /// Sources were created and can be configured
    SourceCreated,
    /// Application-defined message
    Application(String),
}

/// Posting handle for pipeline bus messages
#[derive(Clone)]
pub struct BusSender {
    control: ControlSender,
}

impl BusSender {
    pub(crate) fn new(control: ControlSender) -> Self {
        Self { control }
    }

    /// Post a message to the player's control thread
    ///
    /// Returns `false` when the player is gone.
    pub fn post(&self, message: PipelineMessage) -> bool {
        self.control.post(ControlTask::Pipeline(message))
    }
}

impl fmt::Debug for BusSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSender").finish_non_exhaustive()
    }
}

/// Platform media pipeline
///
/// All methods are synchronous; state changes may complete asynchronously
/// and are then acknowledged with [`PipelineMessage::StateChanged`] and
/// [`PipelineMessage::AsyncDone`].
pub trait Pipeline: Send + Sync {
    /// Connect the pipeline's bus to the player
    fn attach_bus(&self, bus: BusSender);

    /// Request a state change; `false` if the pipeline refused it
    fn set_state(&self, state: PipelineState) -> bool;

    fn current_state(&self) -> PipelineState;

    /// State the pipeline is transitioning to, if any
    fn pending_state(&self) -> Option<PipelineState>;

    /// Configure the stream sources once they exist
    fn setup_sources(&self, codecs: Codecs);

    /// Push one decrypted (or clear) sample into its stream source
    fn push_sample(&self, sample: EncodedSample) -> bool;

    fn end_of_stream(&self, stream: StreamType);

    /// Flushing seek to `position` at `rate`
    fn flushing_seek(&self, position: MediaTime, rate: f64) -> bool;

    /// Change playback rate without a flush
    fn set_segment_rate(&self, rate: f64) -> bool;

    fn query_position(&self) -> Option<MediaTime>;

    fn query_duration(&self) -> Option<MediaTime>;

    fn set_volume(&self, volume: f64);

    fn volume(&self) -> f64;

    /// `false` when no video sink exists yet to apply the rectangle to
    fn set_video_rectangle(&self, bounds: Bounds) -> bool;

    /// Frames dropped by the video sink, when the sink reports it
    fn dropped_video_frames(&self) -> Option<u64> {
        None
    }

    fn recalculate_latency(&self) {}
}

/// Secure buffer support for protected video paths
pub trait SecureMemory: Send + Sync {
    /// Move the sample payload into secure memory
    fn copy_in(&self, sample: &mut EncodedSample) -> bool;

    /// `false` when the secure pool is close to exhaustion
    fn has_headroom(&self) -> bool;
}
