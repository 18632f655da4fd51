//! Buffer-health watchdog
//!
//! Periodically compares how far each stream has been fed ahead of the
//! playback position. When the pushed data is not keeping up with playback
//! and the margin drops below the minimum, playback is paused internally;
//! once every stream has rebuilt enough margin it is resumed.
//!
//! **Resume thresholds:**
//! - First playback (position zero or still at the seek target): the first
//!   playback margin, or readiness forced after several checks without video
//!   progress (content may simply be short)
//! - Steady playback: the steady margin
//!
//! The watchdog never resumes playback while the caller's rate is not
//! positive; an explicit pause always wins over buffer recovery.

use crate::config::PlayerConfig;
use playcore_common::{MediaTime, PerStream, StreamFlags, StreamType};
use tracing::{debug, info, warn};

/// Thresholds the watchdog evaluates against
#[derive(Debug, Clone, Copy)]
pub struct WatchdogThresholds {
    pub interval: MediaTime,
    pub min_buffer: MediaTime,
    pub first_playback_buffer: MediaTime,
    pub steady_buffer: MediaTime,
    pub stall_check_limit: u32,
}

impl From<&PlayerConfig> for WatchdogThresholds {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            interval: MediaTime::from_millis(config.watchdog_interval_ms as i64),
            min_buffer: MediaTime::from_millis(config.min_buffer_ms as i64),
            first_playback_buffer: MediaTime::from_millis(config.first_playback_buffer_ms as i64),
            steady_buffer: MediaTime::from_millis(config.steady_buffer_ms as i64),
            stall_check_limit: config.stall_check_limit,
        }
    }
}

/// Snapshot of the player taken for one check
#[derive(Debug, Clone, Copy)]
pub struct WatchdogInput {
    /// Monotonic time of the check
    pub now: MediaTime,
    pub position: MediaTime,
    /// Outstanding seek target, [`MediaTime::MAX`] when none
    pub seek_target: MediaTime,
    pub max_pushed: PerStream<MediaTime>,
    pub present: StreamFlags,
    pub pipeline_playing: bool,
    pub rate: f64,
}

/// Decision of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    None,
    /// Buffer margin exhausted: pause the pipeline
    PauseInternal,
    /// Margin rebuilt: resume the pipeline
    Resume,
    /// Margin rebuilt but the caller has playback paused
    RecoveredWhilePaused,
}

#[derive(Debug, Clone)]
pub struct BufferHealthWatchdog {
    thresholds: WatchdogThresholds,
    paused_internal: bool,
    last_check: Option<MediaTime>,
    last_pushed: PerStream<MediaTime>,
    last_stall_gap: MediaTime,
    stagnant_checks: u32,
}

impl BufferHealthWatchdog {
    /// Starts internally paused: initial playback is gated on buffer health
    pub fn new(thresholds: WatchdogThresholds) -> Self {
        Self {
            thresholds,
            paused_internal: true,
            last_check: None,
            last_pushed: PerStream::splat(MediaTime::ZERO),
            last_stall_gap: MediaTime::ZERO,
            stagnant_checks: 0,
        }
    }

    pub fn is_paused_internal(&self) -> bool {
        self.paused_internal
    }

    pub fn set_paused_internal(&mut self, paused: bool) {
        self.paused_internal = paused;
    }

    /// Restart growth measurement (after a seek)
    pub fn reset_check_clock(&mut self) {
        self.last_check = None;
    }

    pub fn evaluate(&mut self, input: &WatchdogInput) -> WatchdogAction {
        let Some(last_check) = self.last_check else {
            self.last_check = Some(input.now);
            self.last_pushed = input.max_pushed;
            return WatchdogAction::None;
        };

        let elapsed = input.now.saturating_sub(last_check);
        if elapsed < self.thresholds.interval && !self.paused_internal {
            return WatchdogAction::None;
        }

        let action = if self.paused_internal {
            self.check_recovery(input)
        } else if input.pipeline_playing {
            self.check_starvation(input, elapsed)
        } else {
            WatchdogAction::None
        };

        self.last_check = Some(input.now);
        self.last_pushed = input.max_pushed;
        action
    }

    fn gap(input: &WatchdogInput, stream: StreamType) -> MediaTime {
        input.max_pushed[stream].saturating_sub(input.position)
    }

    fn check_starvation(&mut self, input: &WatchdogInput, elapsed: MediaTime) -> WatchdogAction {
        // Playback consumed more than was fed since the last check
        let falling_behind = input
            .present
            .streams()
            .any(|stream| elapsed > input.max_pushed[stream].saturating_sub(self.last_pushed[stream]));
        if !falling_behind {
            return WatchdogAction::None;
        }

        let starving = input
            .present
            .streams()
            .find(|stream| Self::gap(input, *stream) < self.thresholds.min_buffer);
        match starving {
            Some(stream) => {
                warn!(
                    %stream,
                    gap_ms = Self::gap(input, stream).as_millis(),
                    position = %input.position,
                    "Buffer running dry, pausing playback"
                );
                self.paused_internal = true;
                WatchdogAction::PauseInternal
            }
            None => WatchdogAction::None,
        }
    }

    fn check_recovery(&mut self, input: &WatchdogInput) -> WatchdogAction {
        let first_playback = input.position == MediaTime::ZERO || input.position == input.seek_target;
        let mut ready = PerStream::new(!input.present.audio, !input.present.video);

        if first_playback {
            let threshold = self.thresholds.first_playback_buffer;
            for stream in input.present.streams() {
                ready[stream] = Self::gap(input, stream) >= threshold;
            }

            let stall_stream = if input.present.video {
                StreamType::Video
            } else {
                StreamType::Audio
            };
            let stall_gap = Self::gap(input, stall_stream);
            if stall_gap == self.last_stall_gap {
                self.stagnant_checks += 1;
            } else {
                self.stagnant_checks = 0;
            }
            self.last_stall_gap = stall_gap;

            if self.stagnant_checks > self.thresholds.stall_check_limit {
                debug!(checks = self.stagnant_checks, "No buffer progress, forcing playback start");
                ready = PerStream::splat(true);
            }
        } else {
            let threshold = self.thresholds.steady_buffer;
            for stream in input.present.streams() {
                ready[stream] = Self::gap(input, stream) >= threshold;
            }
        }

        if !(ready.audio && ready.video) {
            return WatchdogAction::None;
        }

        self.paused_internal = false;
        self.stagnant_checks = 0;
        if input.rate > 0.0 {
            info!(position = %input.position, "Buffer recovered, resuming playback");
            WatchdogAction::Resume
        } else {
            debug!("Buffer recovered while paused by caller");
            WatchdogAction::RecoveredWhilePaused
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> WatchdogThresholds {
        WatchdogThresholds::from(&PlayerConfig::default())
    }

    fn input(now_ms: i64, position_ms: i64, audio_ms: i64, video_ms: i64) -> WatchdogInput {
        WatchdogInput {
            now: MediaTime::from_millis(now_ms),
            position: MediaTime::from_millis(position_ms),
            seek_target: MediaTime::MAX,
            max_pushed: PerStream::new(MediaTime::from_millis(audio_ms), MediaTime::from_millis(video_ms)),
            present: StreamFlags::splat(true),
            pipeline_playing: true,
            rate: 1.0,
        }
    }

    fn running() -> BufferHealthWatchdog {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        watchdog.set_paused_internal(false);
        watchdog.evaluate(&input(0, 0, 3_000, 1_050));
        watchdog
    }

    #[test]
    fn test_first_check_only_primes() {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        assert_eq!(watchdog.evaluate(&input(0, 0, 5_000, 5_000)), WatchdogAction::None);
        assert!(watchdog.is_paused_internal());
    }

    #[test]
    fn test_pauses_when_starving() {
        let mut watchdog = running();
        // No audio fed for 200ms and video only 100ms ahead of the position
        let action = watchdog.evaluate(&input(200, 1_000, 3_000, 1_100));
        assert_eq!(action, WatchdogAction::PauseInternal);
        assert!(watchdog.is_paused_internal());
    }

    #[test]
    fn test_no_pause_when_margin_is_healthy() {
        let mut watchdog = running();
        let action = watchdog.evaluate(&input(200, 1_000, 3_000, 3_000));
        assert_eq!(action, WatchdogAction::None);
    }

    #[test]
    fn test_no_pause_when_pipeline_not_playing() {
        let mut watchdog = running();
        let mut check = input(200, 1_000, 1_000, 1_000);
        check.pipeline_playing = false;
        assert_eq!(watchdog.evaluate(&check), WatchdogAction::None);
    }

    #[test]
    fn test_checks_within_interval_are_skipped() {
        let mut watchdog = running();
        assert_eq!(watchdog.evaluate(&input(50, 1_000, 1_000, 1_000)), WatchdogAction::None);
        assert!(!watchdog.is_paused_internal());
    }

    #[test]
    fn test_first_playback_resumes_at_first_threshold() {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        watchdog.evaluate(&input(0, 0, 0, 0));
        assert_eq!(watchdog.evaluate(&input(100, 0, 400, 600)), WatchdogAction::None);
        assert_eq!(watchdog.evaluate(&input(200, 0, 500, 600)), WatchdogAction::Resume);
        assert!(!watchdog.is_paused_internal());
    }

    #[test]
    fn test_steady_playback_needs_steady_threshold() {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        watchdog.evaluate(&input(0, 5_000, 0, 0));
        assert_eq!(watchdog.evaluate(&input(100, 5_000, 6_000, 6_000)), WatchdogAction::None);
        assert_eq!(watchdog.evaluate(&input(200, 5_000, 7_000, 7_000)), WatchdogAction::Resume);
    }

    #[test]
    fn test_seek_target_counts_as_first_playback() {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        let mut check = input(0, 12_000, 0, 0);
        check.seek_target = MediaTime::from_millis(12_000);
        watchdog.evaluate(&check);

        check.now = MediaTime::from_millis(100);
        check.max_pushed = PerStream::splat(MediaTime::from_millis(12_600));
        assert_eq!(watchdog.evaluate(&check), WatchdogAction::Resume);
    }

    #[test]
    fn test_stagnant_video_forces_start() {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        watchdog.evaluate(&input(0, 0, 0, 0));

        let mut action = WatchdogAction::None;
        let mut checks = 0;
        while action == WatchdogAction::None && checks < 20 {
            checks += 1;
            action = watchdog.evaluate(&input(checks * 100, 0, 1_000, 200));
        }
        assert_eq!(action, WatchdogAction::Resume);
        // First check establishes the gap, the limit must then be exceeded
        assert_eq!(checks, 10);
    }

    #[test]
    fn test_never_resumes_at_non_positive_rate() {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        let mut check = input(0, 0, 0, 0);
        check.rate = 0.0;
        watchdog.evaluate(&check);

        check.now = MediaTime::from_millis(100);
        check.max_pushed = PerStream::splat(MediaTime::from_secs(3));
        assert_eq!(watchdog.evaluate(&check), WatchdogAction::RecoveredWhilePaused);
        assert!(!watchdog.is_paused_internal());
    }

    #[test]
    fn test_audio_only_player_ignores_video() {
        let mut watchdog = BufferHealthWatchdog::new(thresholds());
        let mut check = input(0, 0, 0, 0);
        check.present = StreamFlags::new(true, false);
        watchdog.evaluate(&check);

        check.now = MediaTime::from_millis(100);
        check.max_pushed = PerStream::new(MediaTime::from_millis(600), MediaTime::ZERO);
        assert_eq!(watchdog.evaluate(&check), WatchdogAction::Resume);
    }
}
