//! Control-thread handlers
//!
//! **Responsibilities:**
//! - Dispatch of [`ControlTask`]s posted to the control thread
//! - Pipeline bus messages (state changes, preroll, errors, flow signals)
//! - Preroll completion: drain retained samples, re-arm requests, present
//! - Buffer-health watchdog tick
//! - Deferred source setup and force stop

use crate::pipeline::{ErrorDomain, PipelineMessage, PipelineState};
use crate::playback::control::{ControlHandler, ControlTask};
use crate::playback::state::{PendingAction, PlaybackState, PrerollOutcome};
use crate::playback::watchdog::{WatchdogAction, WatchdogInput};
use playcore_common::events::{DecoderState, PlayerErrorKind, PlayerState};
use playcore_common::{StreamFlags, StreamType};
use std::sync::atomic::Ordering;
use tracing::{debug, error, info, trace, warn};

use super::core::PlayerCore;

impl ControlHandler for PlayerCore {
    fn handle(&self, task: ControlTask) {
        trace!(player = %self.id, task = task.name(), "Control task");
        match task {
            ControlTask::PlayerStatus { state, ticket } => {
                debug!(player = %self.id, %state, ticket, "Player status");
                self.callbacks.on_player_state(self.id, state, ticket);
            }
            ControlTask::NeedsData { stream, ticket } => {
                self.callbacks
                    .on_decoder_status(self.id, stream, DecoderState::NeedsData, ticket);
            }
            ControlTask::Error { kind, message } => {
                self.callbacks.on_error(self.id, kind, &message);
            }
            ControlTask::Pipeline(message) => self.handle_pipeline_message(message),
            ControlTask::KeyReady(key) => self.replay_for_key_ready(key),
            ControlTask::ReplayAfterFlush => self.replay_ready_samples(),
            ControlTask::CompletePreroll => {
                if self.lock_shared().machine.state().is_prerolling() {
                    self.complete_preroll();
                }
            }
            ControlTask::DelayedVideoRequest => {
                let mut shared = self.lock_shared();
                shared.video_request_timer = None;
                self.request_data(&mut shared, StreamFlags::new(false, true));
            }
            ControlTask::FinishSourceSetup => self.finish_source_setup(),
            ControlTask::ForceStop => self.force_stop(),
            ControlTask::Shutdown { ticket } => {
                self.callbacks.on_player_state(self.id, PlayerState::Destroyed, ticket);
            }
        }
    }

    fn watchdog_tick(&self) {
        self.check_buffer_health();
    }
}

impl PlayerCore {
    fn handle_pipeline_message(&self, message: PipelineMessage) {
        match message {
            PipelineMessage::StateChanged { old, new, pending } => self.on_state_changed(old, new, pending),
            PipelineMessage::AsyncDone => self.on_preroll_complete(),
            PipelineMessage::EndOfStream => {
                info!(player = %self.id, "Pipeline reached end of stream");
                let ticket = self.lock_shared().machine.ticket();
                self.post_status(PlayerState::EndOfStream, ticket);
            }
            PipelineMessage::Error { domain, message } => self.on_pipeline_error(domain, message),
            PipelineMessage::ClockLost => {
                warn!(player = %self.id, "Pipeline clock lost");
                let _state_change = self.lock_state_change();
                if self.may_resume() {
                    self.change_pipeline_state(PipelineState::Paused);
                    self.change_pipeline_state(PipelineState::Playing);
                }
            }
            PipelineMessage::Latency => self.pipeline.recalculate_latency(),
            PipelineMessage::Qos { dropped } => {
                self.lock_shared().dropped_video_frames = dropped;
            }
            PipelineMessage::SegmentReceived => {
                let rate = self.lock_shared().machine.on_segment_received();
                if let Some(rate) = rate {
                    info!(player = %self.id, rate, "Applying postponed rate");
                    self.apply_rate(rate, false);
                }
                self.resume_deferred_preroll();
            }
            PipelineMessage::NeedData(stream) => {
                let mut shared = self.lock_shared();
                let after_seek = shared.machine.state() == PlaybackState::PrerollAfterSeek;
                let emit = shared.flow.on_pipeline_need_data(stream, after_seek);
                trace!(player = %self.id, %stream, after_seek, "Pipeline needs data");
                self.notify_needs_data(&shared, emit);
            }
            PipelineMessage::EnoughData(stream) => {
                trace!(player = %self.id, %stream, "Pipeline has enough data");
                self.lock_shared().flow.set_has_enough(stream);
            }
            PipelineMessage::SeekData(stream) => {
                let mut shared = self.lock_shared();
                if shared.machine.state() == PlaybackState::PrerollAfterSeek {
                    shared.flow.set_has_enough(stream);
                }
            }
            PipelineMessage::SourceCreated => self.schedule_source_setup(),
            PipelineMessage::Application(name) => {
                debug!(player = %self.id, %name, "Application message");
            }
        }
    }

    fn on_state_changed(&self, old: PipelineState, new: PipelineState, pending: Option<PipelineState>) {
        info!(player = %self.id, %old, %new, ?pending, "Pipeline state changed");
        if self.pipeline.current_state() < PipelineState::Paused {
            return;
        }

        self.apply_pending_bounds();

        let action = self.lock_shared().machine.on_pipeline_can_seek();
        match action {
            PendingAction::None => {}
            PendingAction::ApplyRate(rate) => {
                info!(player = %self.id, rate, "Applying pending rate");
                self.apply_rate(rate, false);
            }
            PendingAction::ApplySeek { position, ticket, rate } => {
                if let Some(rate) = rate {
                    self.lock_shared().rate = rate;
                }
                info!(player = %self.id, %position, ticket, "Applying pending seek");
                self.seek(position, ticket);
            }
        }
        self.resume_deferred_preroll();
    }

    fn apply_pending_bounds(&self) {
        if !self.codecs.is_present(StreamType::Video) {
            return;
        }
        let Some(bounds) = self.lock_shared().pending_bounds.take() else {
            return;
        };
        debug!(player = %self.id, ?bounds, "Applying pending bounds");
        if !self.pipeline.set_video_rectangle(bounds) {
            self.lock_shared().pending_bounds = Some(bounds);
        }
    }

    fn on_pipeline_error(&self, domain: ErrorDomain, message: String) {
        let (all_ended, ticket) = {
            let shared = self.lock_shared();
            (shared.flow.all_ended(), shared.machine.ticket())
        };
        if domain == ErrorDomain::Stream && all_ended {
            info!(player = %self.id, %message, "Stream error after end of stream, reporting end of stream");
            self.post_status(PlayerState::EndOfStream, ticket);
            return;
        }
        error!(player = %self.id, ?domain, %message, "Pipeline error");
        self.post(ControlTask::Error {
            kind: PlayerErrorKind::Decode,
            message,
        });
    }

    fn on_preroll_complete(&self) {
        let outcome = self.lock_shared().machine.on_preroll_complete();
        match outcome {
            PrerollOutcome::Ignored => debug!(player = %self.id, "Async done outside preroll"),
            PrerollOutcome::Deferred => {
                info!(player = %self.id, "Preroll done, waiting for pending seek or rate change");
            }
            PrerollOutcome::Complete => self.complete_preroll(),
        }
    }

    fn resume_deferred_preroll(&self) {
        if self.lock_shared().machine.take_deferred_preroll() {
            self.complete_preroll();
        }
    }

    /// Drain retained samples, re-arm data requests and report presenting
    fn complete_preroll(&self) {
        let previous = self.lock_shared().flow.begin_preroll_drain();
        self.replay_ready_samples();

        let mut shared = self.lock_shared();
        let emit = shared.flow.finish_preroll_drain(previous);
        self.notify_needs_data(&shared, emit);
        shared.machine.enter_presenting();
        let ticket = shared.machine.ticket();
        drop(shared);

        info!(player = %self.id, ticket, "Preroll done, presenting");
        self.post_status(PlayerState::Presenting, ticket);
    }

    fn check_buffer_health(&self) {
        if self.lock_shared().machine.state() != PlaybackState::Presenting {
            return;
        }
        let position = self.current_position();
        let pipeline_playing = self.pipeline.current_state() == PipelineState::Playing;

        let action = {
            let mut shared = self.lock_shared();
            let input = WatchdogInput {
                now: self.monotonic_now(),
                position,
                seek_target: shared.machine.seek_position(),
                max_pushed: shared.timestamps.max_timestamps(),
                present: self.codecs.present(),
                pipeline_playing,
                rate: shared.rate,
            };
            shared.watchdog.evaluate(&input)
        };

        match action {
            WatchdogAction::PauseInternal => {
                self.change_pipeline_state(PipelineState::Paused);
            }
            WatchdogAction::Resume => {
                let _state_change = self.lock_state_change();
                if self.may_resume() {
                    self.change_pipeline_state(PipelineState::Playing);
                } else {
                    debug!(player = %self.id, "Caller paused meanwhile, not resuming");
                }
            }
            WatchdogAction::None | WatchdogAction::RecoveredWhilePaused => {}
        }
    }

    fn schedule_source_setup(&self) {
        if self.force_stopped.load(Ordering::SeqCst) {
            debug!(player = %self.id, "Force stopped, skipping source setup");
            return;
        }
        let handle = self
            .scheduler
            .schedule(self.config.source_setup_delay(), ControlTask::FinishSourceSetup);
        if let Some(previous) = self.lock_source_setup().replace(handle) {
            previous.abort();
        }
    }

    fn finish_source_setup(&self) {
        if self.lock_source_setup().take().is_none() {
            return;
        }
        info!(player = %self.id, codecs = ?self.codecs, "Configuring sources");
        self.pipeline.setup_sources(self.codecs);
    }

    fn force_stop(&self) {
        if self.force_stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(player = %self.id, "Force stop");
        if let Some(setup) = self.lock_source_setup().take() {
            setup.abort();
        }
        self.change_pipeline_state(PipelineState::Ready);
    }
}
