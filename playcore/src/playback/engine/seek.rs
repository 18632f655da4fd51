//! Seek, rate and position
//!
//! **Responsibilities:**
//! - `seek`: initial preroll, deferred seeks and flushing seeks
//! - `apply_rate`: caller pause/resume and segment rate changes
//! - `current_position`: seek-target aware position reporting

use crate::pipeline::PipelineState;
use crate::playback::control::ControlTask;
use crate::playback::state::{PlaybackState, RateDecision, SeekDecision};
use playcore_common::events::PlayerState;
use playcore_common::MediaTime;
use tracing::{debug, error, info};

use super::core::PlayerCore;

impl PlayerCore {
    pub(super) fn seek(&self, position: MediaTime, ticket: i32) {
        info!(player = %self.id, %position, ticket, "Seek");
        let current = self.pipeline.current_state();

        let (decision, rate) = {
            let mut shared = self.lock_shared();
            shared.flow.reset_for_seek();
            shared.watchdog.reset_check_clock();
            if position >= self.config.far_seek_threshold() {
                debug!(player = %self.id, %position, "Far seek, waiting for buffers before playing");
                shared.watchdog.set_paused_internal(true);
            }

            let decision = shared
                .machine
                .begin_seek(position, ticket, current >= PipelineState::Paused);
            match decision {
                SeekDecision::StartInitialPreroll => self.post_status(PlayerState::Prerolling, ticket),
                SeekDecision::Deferred => {
                    if shared.machine.state() == PlaybackState::InitialPreroll {
                        let lacking = shared.flow.lacking_data();
                        self.request_data(&mut shared, lacking);
                    }
                }
                SeekDecision::Flush => {}
            }
            (decision, shared.rate)
        };

        match decision {
            SeekDecision::StartInitialPreroll => {
                let pending = self.pipeline.pending_state();
                if current < PipelineState::Paused && pending.map_or(true, |p| p < PipelineState::Paused) {
                    self.change_pipeline_state(PipelineState::Paused);
                }
            }
            SeekDecision::Deferred => {}
            SeekDecision::Flush => self.issue_flushing_seek(position, ticket, rate),
        }
    }

    fn issue_flushing_seek(&self, position: MediaTime, ticket: i32, rate: f64) {
        let settle = self.config.seek_settle_delay();
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        self.post_status(PlayerState::Prerolling, ticket);

        let seek_rate = if rate == 0.0 { 1.0 } else { rate };
        let issued = self.pipeline.flushing_seek(position, seek_rate);
        let refused = self.lock_shared().machine.flush_issued(issued);
        if refused {
            error!(player = %self.id, %position, "Flushing seek failed");
            self.post_status(PlayerState::Presenting, ticket);
        } else {
            self.post(ControlTask::ReplayAfterFlush);
        }
    }

    /// Apply a playback rate
    ///
    /// `save` is false when a postponed rate is re-applied internally; the
    /// caller's rate was stored when it was first requested.
    pub(super) fn apply_rate(&self, rate: f64, save: bool) -> bool {
        info!(player = %self.id, rate, save, "Set playback rate");
        let _state_change = self.lock_state_change();
        let (previous, paused_internal) = {
            let mut shared = self.lock_shared();
            if shared.rate > 0.0 {
                shared.pre_rate = shared.rate;
            }
            if save {
                shared.rate = rate;
            }
            shared.flow.clear_end_of_stream();
            (shared.pre_rate, shared.watchdog.is_paused_internal())
        };
        self.current_position();

        if rate == 0.0 {
            let timer = {
                let mut shared = self.lock_shared();
                shared.machine.cancel_pending_rate();
                shared.video_request_timer.take()
            };
            if let Some(timer) = timer {
                timer.abort();
            }
            self.change_pipeline_state(PipelineState::Paused);
            return true;
        }

        if rate == 1.0 && (previous == 1.0 || previous == 0.0) {
            if !paused_internal {
                self.change_pipeline_state(PipelineState::Playing);
            }
            return true;
        }

        if !paused_internal {
            self.change_pipeline_state(PipelineState::Playing);
        } else if !save {
            // The watchdog decides when to play; the segment rate still applies
            self.change_pipeline_state(PipelineState::Paused);
        }

        let can_seek = self.pipeline.current_state() >= PipelineState::Paused;
        match self.lock_shared().machine.request_rate(rate, can_seek) {
            RateDecision::CarriedBySeek => {
                debug!(player = %self.id, rate, "Rate will be applied by the pending seek");
                return true;
            }
            RateDecision::Postponed => return true,
            RateDecision::ApplyNow => {}
        }

        let applied = self.pipeline.set_segment_rate(rate);
        if !applied {
            error!(player = %self.id, rate, "Pipeline refused rate change");
        }
        if self.lock_shared().machine.take_deferred_preroll() {
            self.post(ControlTask::CompletePreroll);
        }
        applied
    }

    /// Position to report to the caller
    ///
    /// While a seek target is outstanding it is reported until the pipeline
    /// plays past it; while paused the last cached position is reported.
    pub(super) fn current_position(&self) -> MediaTime {
        let queried = self.pipeline.query_position();
        let state = self.pipeline.current_state();
        let pending = self.pipeline.pending_state();

        let mut shared = self.lock_shared();
        let seek_target = shared.machine.seek_position();
        if !seek_target.is_max() {
            if state != PipelineState::Playing {
                return seek_target;
            }
            let position = queried.unwrap_or(MediaTime::ZERO);
            let before_target = if shared.rate >= 0.0 {
                position <= seek_target
            } else {
                position >= seek_target
            };
            if before_target {
                return seek_target;
            }
            shared.machine.clear_seek_position();
        }

        if shared.rate == 0.0 || state == PipelineState::Paused || pending == Some(PipelineState::Paused) {
            return shared.cached_position;
        }
        if let Some(position) = queried {
            shared.cached_position = position;
        }
        shared.cached_position
    }
}
