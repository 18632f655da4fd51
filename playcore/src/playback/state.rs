//! Playback state machine
//!
//! Pure bookkeeping for the player's lifecycle and for seek and rate
//! requests that cannot take effect immediately. The engine feeds it events
//! and carries out the decisions it returns; nothing here touches the
//! pipeline.
//!
//! ```text
//! Initial --seek--> InitialPreroll --preroll done--> Presenting
//!    Presenting --seek--> PrerollAfterSeek --preroll done--> Presenting
//! ```

use playcore_common::events::INITIAL_TICKET;
use playcore_common::MediaTime;
use std::fmt;
use tracing::{debug, info};

/// Player lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Before construction completes or after teardown
    Null,
    Initial,
    InitialPreroll,
    PrerollAfterSeek,
    Presenting,
}

impl PlaybackState {
    /// Either of the two preroll states
    pub fn is_prerolling(self) -> bool {
        matches!(self, PlaybackState::InitialPreroll | PlaybackState::PrerollAfterSeek)
    }

    /// No media has been presented yet
    pub fn is_initial_phase(self) -> bool {
        matches!(self, PlaybackState::Initial | PlaybackState::InitialPreroll)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Null => write!(f, "Null"),
            PlaybackState::Initial => write!(f, "Initial"),
            PlaybackState::InitialPreroll => write!(f, "InitialPreroll"),
            PlaybackState::PrerollAfterSeek => write!(f, "PrerollAfterSeek"),
            PlaybackState::Presenting => write!(f, "Presenting"),
        }
    }
}

/// What the engine must do for a seek request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDecision {
    /// First seek: report prerolling and bring the pipeline to paused
    StartInitialPreroll,
    /// Pipeline cannot seek yet; the request is kept until it can
    Deferred,
    /// Issue a flushing seek now
    Flush,
}

/// What the engine must do for a rate change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// A pending seek will carry the new rate
    CarriedBySeek,
    /// Postponed until the pipeline can take it
    Postponed,
    /// Apply to the pipeline now
    ApplyNow,
}

/// Request that became applicable once the pipeline reached paused
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAction {
    None,
    ApplyRate(f64),
    /// Re-issue the deferred seek; a postponed rate rides along with it
    ApplySeek {
        position: MediaTime,
        ticket: i32,
        rate: Option<f64>,
    },
}

/// Outcome of a preroll completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrerollOutcome {
    /// Not prerolling; nothing to do
    Ignored,
    /// A seek or rate change is still outstanding
    Deferred,
    /// Drain retained samples and start presenting
    Complete,
}

#[derive(Debug, Clone)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
    ticket: i32,
    /// Last seek target, [`MediaTime::MAX`] when none is outstanding
    seek_position: MediaTime,
    seek_pending: bool,
    /// Postponed rate, 0 when none
    pending_rate: f64,
    /// Flushing seek issued, waiting for the new segment
    seeking: bool,
    rate_being_changed: bool,
    /// A flushing seek is being issued right now
    flushing: bool,
    preroll_deferred: bool,
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Null,
            ticket: INITIAL_TICKET,
            seek_position: MediaTime::MAX,
            seek_pending: false,
            pending_rate: 0.0,
            seeking: false,
            rate_being_changed: false,
            flushing: false,
            preroll_deferred: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn ticket(&self) -> i32 {
        self.ticket
    }

    pub fn seek_position(&self) -> MediaTime {
        self.seek_position
    }

    /// Playback moved past the seek target
    pub fn clear_seek_position(&mut self) {
        self.seek_position = MediaTime::MAX;
    }

    pub fn is_seek_pending(&self) -> bool {
        self.seek_pending
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    pub fn pending_rate(&self) -> f64 {
        self.pending_rate
    }

    pub fn rate_pending(&self) -> bool {
        !self.seeking && self.pending_rate != 0.0
    }

    /// Written samples must be retained for redelivery
    pub fn keep_samples(&self) -> bool {
        self.seek_pending || self.rate_pending() || self.flushing
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state != next {
            info!("Playback state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Construction finished and the control thread is running
    pub fn initialize(&mut self) {
        self.transition(PlaybackState::Initial);
    }

    pub fn shut_down(&mut self) {
        self.transition(PlaybackState::Null);
    }

    pub fn begin_seek(&mut self, position: MediaTime, ticket: i32, pipeline_can_seek: bool) -> SeekDecision {
        self.ticket = ticket;
        self.seek_position = position;

        if self.state == PlaybackState::Initial {
            self.transition(PlaybackState::InitialPreroll);
            self.seek_position = MediaTime::MAX;
            self.rate_being_changed = true;
            return SeekDecision::StartInitialPreroll;
        }

        if !pipeline_can_seek {
            debug!(%position, ticket, "Delaying seek until the pipeline is paused");
            self.seek_pending = true;
            return SeekDecision::Deferred;
        }

        self.seek_pending = false;
        self.flushing = true;
        // The new segment may reach the bus before the seek call returns
        self.seeking = true;
        // The new flush brings its own preroll completion
        self.preroll_deferred = false;
        self.transition(PlaybackState::PrerollAfterSeek);
        SeekDecision::Flush
    }

    /// The flushing seek was handed to the pipeline
    ///
    /// A refused seek returns the player to presenting; the return value is
    /// `true` in that case so the engine can report it.
    pub fn flush_issued(&mut self, success: bool) -> bool {
        self.flushing = false;
        if success {
            false
        } else {
            self.seeking = false;
            self.transition(PlaybackState::Presenting);
            true
        }
    }

    pub fn request_rate(&mut self, rate: f64, pipeline_can_seek: bool) -> RateDecision {
        if self.seek_pending {
            return RateDecision::CarriedBySeek;
        }
        if !pipeline_can_seek || self.seeking || self.rate_being_changed {
            debug!(rate, "Postponing rate change");
            self.pending_rate = rate;
            return RateDecision::Postponed;
        }
        self.pending_rate = 0.0;
        RateDecision::ApplyNow
    }

    /// Drop a postponed rate (an explicit pause supersedes it)
    pub fn cancel_pending_rate(&mut self) {
        self.pending_rate = 0.0;
    }

    /// The pipeline reached paused or above
    pub fn on_pipeline_can_seek(&mut self) -> PendingAction {
        let rate_pending = self.rate_pending();

        if self.seek_pending {
            let rate = rate_pending.then_some(self.pending_rate);
            if rate.is_some() {
                self.pending_rate = 0.0;
            }
            return PendingAction::ApplySeek {
                position: self.seek_position,
                ticket: self.ticket,
                rate,
            };
        }

        if rate_pending {
            return PendingAction::ApplyRate(self.pending_rate);
        }
        PendingAction::None
    }

    /// A new segment reached the sinks; returns a rate still to apply
    pub fn on_segment_received(&mut self) -> Option<f64> {
        let apply = (self.seeking || self.rate_being_changed) && self.pending_rate != 0.0;
        self.seeking = false;
        self.rate_being_changed = false;
        apply.then_some(self.pending_rate)
    }

    pub fn on_preroll_complete(&mut self) -> PrerollOutcome {
        if !self.state.is_prerolling() {
            return PrerollOutcome::Ignored;
        }
        if self.seek_pending || self.rate_pending() {
            debug!("Preroll finished with a seek or rate change outstanding");
            self.preroll_deferred = true;
            return PrerollOutcome::Deferred;
        }
        self.preroll_deferred = false;
        PrerollOutcome::Complete
    }

    /// A deferred preroll whose blocking request has since been applied
    pub fn take_deferred_preroll(&mut self) -> bool {
        if self.preroll_deferred && self.state.is_prerolling() && !self.seek_pending && !self.rate_pending() {
            self.preroll_deferred = false;
            return true;
        }
        false
    }

    pub fn enter_presenting(&mut self) {
        self.transition(PlaybackState::Presenting);
    }
}
