//! Pipeline double with asynchronous state changes
//!
//! Wraps the simulated pipeline and can
//! - hold a Playing -> Paused change as the pending state, like a real
//!   pipeline whose pause has not completed yet
//! - block the next change to Playing inside `set_state` until released

use playcore::sim::SimulatedPipeline;
use playcore::{BusSender, Bounds, Codecs, EncodedSample, MediaTime, Pipeline, PipelineState, StreamType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use super::test_player::EVENT_TIMEOUT;

#[derive(Default)]
struct PlayGate {
    armed: bool,
    entered: bool,
    released: bool,
}

pub struct ControlledPipeline {
    inner: Arc<SimulatedPipeline>,
    hold_pauses: AtomicBool,
    held: Mutex<Option<PipelineState>>,
    gate: Mutex<PlayGate>,
    gate_changed: Condvar,
}

impl ControlledPipeline {
    pub fn new(inner: Arc<SimulatedPipeline>) -> Self {
        Self {
            inner,
            hold_pauses: AtomicBool::new(false),
            held: Mutex::new(None),
            gate: Mutex::new(PlayGate::default()),
            gate_changed: Condvar::new(),
        }
    }

    /// Leave Playing -> Paused pending instead of completing it
    pub fn hold_pauses(&self) {
        self.hold_pauses.store(true, Ordering::SeqCst);
    }

    /// Block the next `set_state(Playing)` until [`Self::release_play`]
    pub fn arm_play_gate(&self) {
        *self.gate.lock().unwrap() = PlayGate {
            armed: true,
            ..PlayGate::default()
        };
    }

    /// Wait until a `set_state(Playing)` call is blocked in the gate
    pub fn wait_for_blocked_play(&self) -> bool {
        let gate = self.gate.lock().unwrap();
        let (gate, _) = self
            .gate_changed
            .wait_timeout_while(gate, EVENT_TIMEOUT, |g| !g.entered)
            .unwrap();
        gate.entered
    }

    pub fn release_play(&self) {
        self.gate.lock().unwrap().released = true;
        self.gate_changed.notify_all();
    }

    fn pass_play_gate(&self) {
        let mut gate = self.gate.lock().unwrap();
        if !gate.armed {
            return;
        }
        gate.armed = false;
        gate.entered = true;
        self.gate_changed.notify_all();
        let _ = self
            .gate_changed
            .wait_timeout_while(gate, EVENT_TIMEOUT, |g| !g.released)
            .unwrap();
    }
}

impl Pipeline for ControlledPipeline {
    fn attach_bus(&self, bus: BusSender) {
        self.inner.attach_bus(bus);
    }

    fn set_state(&self, state: PipelineState) -> bool {
        if state == PipelineState::Playing {
            self.pass_play_gate();
        }
        if state == PipelineState::Paused
            && self.hold_pauses.load(Ordering::SeqCst)
            && self.inner.current_state() == PipelineState::Playing
        {
            *self.held.lock().unwrap() = Some(state);
            return true;
        }
        *self.held.lock().unwrap() = None;
        self.inner.set_state(state)
    }

    fn current_state(&self) -> PipelineState {
        self.inner.current_state()
    }

    fn pending_state(&self) -> Option<PipelineState> {
        let held = *self.held.lock().unwrap();
        held.or_else(|| self.inner.pending_state())
    }

    fn setup_sources(&self, codecs: Codecs) {
        self.inner.setup_sources(codecs);
    }

    fn push_sample(&self, sample: EncodedSample) -> bool {
        self.inner.push_sample(sample)
    }

    fn end_of_stream(&self, stream: StreamType) {
        self.inner.end_of_stream(stream);
    }

    fn flushing_seek(&self, position: MediaTime, rate: f64) -> bool {
        self.inner.flushing_seek(position, rate)
    }

    fn set_segment_rate(&self, rate: f64) -> bool {
        self.inner.set_segment_rate(rate)
    }

    fn query_position(&self) -> Option<MediaTime> {
        self.inner.query_position()
    }

    fn query_duration(&self) -> Option<MediaTime> {
        self.inner.query_duration()
    }

    fn set_volume(&self, volume: f64) {
        self.inner.set_volume(volume);
    }

    fn volume(&self) -> f64 {
        self.inner.volume()
    }

    fn set_video_rectangle(&self, bounds: Bounds) -> bool {
        self.inner.set_video_rectangle(bounds)
    }
}
