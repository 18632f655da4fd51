//! Simulated media pipeline
//!
//! State changes complete synchronously and are acknowledged on the bus like
//! a real pipeline would. With auto preroll enabled, reaching `Paused`, a
//! flushing seek and a rate change also produce the segment and preroll
//! messages; tests that want to drive preroll themselves disable it.

use crate::media::{Bounds, Codecs, EncodedSample};
use crate::pipeline::{BusSender, Pipeline, PipelineMessage, PipelineState};
use playcore_common::{MediaTime, StreamFlags, StreamType};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// A sample as it reached the simulated decoder
#[derive(Debug, Clone, PartialEq)]
pub struct PushedSample {
    pub stream: StreamType,
    pub timestamp: MediaTime,
    pub payload: Vec<u8>,
}

struct SimState {
    state: PipelineState,
    bus: Option<BusSender>,
    sources_created: bool,
    configured: Option<Codecs>,
    pushed: Vec<PushedSample>,
    eos: StreamFlags,
    position: MediaTime,
    duration: Option<MediaTime>,
    volume: f64,
    rate: f64,
    rectangle: Option<Bounds>,
    seeks: Vec<(MediaTime, f64)>,
    refuse_seeks: bool,
    dropped_frames: Option<u64>,
}

pub struct SimulatedPipeline {
    inner: Mutex<SimState>,
    auto_preroll: bool,
}

impl SimulatedPipeline {
    /// Pipeline that acknowledges preroll on its own
    pub fn new() -> Self {
        Self::with_auto_preroll(true)
    }

    /// Pipeline whose preroll and segment messages are posted by the test
    pub fn manual() -> Self {
        Self::with_auto_preroll(false)
    }

    fn with_auto_preroll(auto_preroll: bool) -> Self {
        Self {
            inner: Mutex::new(SimState {
                state: PipelineState::Null,
                bus: None,
                sources_created: false,
                configured: None,
                pushed: Vec::new(),
                eos: StreamFlags::NONE,
                position: MediaTime::ZERO,
                duration: None,
                volume: 1.0,
                rate: 1.0,
                rectangle: None,
                seeks: Vec::new(),
                refuse_seeks: false,
                dropped_frames: None,
            }),
            auto_preroll,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Post a bus message as if the pipeline emitted it
    pub fn post(&self, message: PipelineMessage) -> bool {
        let bus = self.lock().bus.clone();
        match bus {
            Some(bus) => bus.post(message),
            None => false,
        }
    }

    fn post_all(&self, messages: Vec<PipelineMessage>) {
        let bus = self.lock().bus.clone();
        if let Some(bus) = bus {
            for message in messages {
                bus.post(message);
            }
        }
    }

    pub fn pushed(&self) -> Vec<PushedSample> {
        self.lock().pushed.clone()
    }

    pub fn pushed_count(&self, stream: StreamType) -> usize {
        self.lock().pushed.iter().filter(|s| s.stream == stream).count()
    }

    pub fn seeks(&self) -> Vec<(MediaTime, f64)> {
        self.lock().seeks.clone()
    }

    pub fn segment_rate(&self) -> f64 {
        self.lock().rate
    }

    pub fn rectangle(&self) -> Option<Bounds> {
        self.lock().rectangle
    }

    pub fn configured_codecs(&self) -> Option<Codecs> {
        self.lock().configured
    }

    pub fn end_of_stream_flags(&self) -> StreamFlags {
        self.lock().eos
    }

    pub fn set_position(&self, position: MediaTime) {
        self.lock().position = position;
    }

    pub fn set_duration(&self, duration: MediaTime) {
        self.lock().duration = Some(duration);
    }

    pub fn set_refuse_seeks(&self, refuse: bool) {
        self.lock().refuse_seeks = refuse;
    }

    pub fn set_dropped_frames(&self, dropped: u64) {
        self.lock().dropped_frames = Some(dropped);
    }

    /// Advance the clock by `elapsed` of wall time when playing
    pub fn advance(&self, elapsed: Duration) {
        let mut inner = self.lock();
        if inner.state == PipelineState::Playing {
            let step = MediaTime::from(elapsed.mul_f64(inner.rate.abs()));
            inner.position = inner.position.saturating_add(step);
        }
    }
}

impl Default for SimulatedPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline for SimulatedPipeline {
    fn attach_bus(&self, bus: BusSender) {
        self.lock().bus = Some(bus);
    }

    fn set_state(&self, state: PipelineState) -> bool {
        let mut messages = Vec::new();
        {
            let mut inner = self.lock();
            let old = inner.state;
            inner.state = state;
            if old != state {
                messages.push(PipelineMessage::StateChanged {
                    old,
                    new: state,
                    pending: None,
                });
            }
            if !inner.sources_created && state > PipelineState::Null {
                inner.sources_created = true;
                messages.push(PipelineMessage::SourceCreated);
            }
            if self.auto_preroll && old < PipelineState::Paused && state == PipelineState::Paused {
                messages.push(PipelineMessage::SegmentReceived);
                messages.push(PipelineMessage::AsyncDone);
            }
            debug!(%old, new = %state, "Simulated pipeline state");
        }
        self.post_all(messages);
        true
    }

    fn current_state(&self) -> PipelineState {
        self.lock().state
    }

    fn pending_state(&self) -> Option<PipelineState> {
        None
    }

    fn setup_sources(&self, codecs: Codecs) {
        self.lock().configured = Some(codecs);
    }

    fn push_sample(&self, sample: EncodedSample) -> bool {
        let mut inner = self.lock();
        if inner.state == PipelineState::Null {
            return false;
        }
        trace!(stream = %sample.stream, timestamp = %sample.timestamp, "Simulated push");
        inner.pushed.push(PushedSample {
            stream: sample.stream,
            timestamp: sample.timestamp,
            payload: sample.payload,
        });
        true
    }

    fn end_of_stream(&self, stream: StreamType) {
        let all_ended = {
            let mut inner = self.lock();
            inner.eos[stream] = true;
            match inner.configured {
                Some(codecs) => inner.eos.contains_all(&codecs.present()),
                None => false,
            }
        };
        if all_ended && self.auto_preroll {
            self.post(PipelineMessage::EndOfStream);
        }
    }

    fn flushing_seek(&self, position: MediaTime, rate: f64) -> bool {
        {
            let mut inner = self.lock();
            inner.seeks.push((position, rate));
            if inner.refuse_seeks {
                return false;
            }
            inner.position = position;
            inner.rate = rate;
            inner.eos = StreamFlags::NONE;
        }
        if self.auto_preroll {
            self.post_all(vec![PipelineMessage::SegmentReceived, PipelineMessage::AsyncDone]);
        }
        true
    }

    fn set_segment_rate(&self, rate: f64) -> bool {
        self.lock().rate = rate;
        if self.auto_preroll {
            self.post(PipelineMessage::SegmentReceived);
        }
        true
    }

    fn query_position(&self) -> Option<MediaTime> {
        Some(self.lock().position)
    }

    fn query_duration(&self) -> Option<MediaTime> {
        self.lock().duration
    }

    fn set_volume(&self, volume: f64) {
        self.lock().volume = volume;
    }

    fn volume(&self) -> f64 {
        self.lock().volume
    }

    fn set_video_rectangle(&self, bounds: Bounds) -> bool {
        let mut inner = self.lock();
        // No video sink until the sources are configured
        if inner.configured.is_none() {
            return false;
        }
        inner.rectangle = Some(bounds);
        true
    }

    fn dropped_video_frames(&self) -> Option<u64> {
        self.lock().dropped_frames
    }
}
