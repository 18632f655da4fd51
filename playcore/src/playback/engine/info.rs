//! Status accessors and presentation settings
//!
//! **Responsibilities:**
//! - `PlayerInfo` snapshot for the media engine
//! - Volume and video bounds

use crate::media::Bounds;
use crate::pipeline::PipelineState;
use playcore_common::{MediaTime, StreamType};
use serde::Serialize;
use tracing::debug;

use super::core::PlayerCore;

/// Snapshot returned by `Player::info`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerInfo {
    pub position: MediaTime,
    pub duration: Option<MediaTime>,
    pub is_paused: bool,
    pub volume: f64,
    pub playback_rate: f64,
    pub total_video_frames: u64,
    pub dropped_video_frames: u64,
    /// Always zero; the pipeline does not report corruption
    pub corrupted_video_frames: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Replayed samples skipped as duplicate timestamps
    pub skipped_duplicate_samples: u64,
    pub pending_samples: usize,
}

impl PlayerCore {
    /// Never waits on the control thread
    pub(super) fn info(&self) -> PlayerInfo {
        let position = self.current_position();
        let duration = self.pipeline.query_duration();
        let current = self.pipeline.current_state();
        let pending = self.pipeline.pending_state();
        let volume = self.pipeline.volume();
        let sink_dropped = self.pipeline.dropped_video_frames();

        let mut shared = self.lock_shared();
        if let Some(dropped) = sink_dropped {
            shared.dropped_video_frames = dropped;
        }
        // A pause the pipeline has not completed yet still counts
        let is_paused = shared.rate == 0.0
            || current != PipelineState::Playing
            || pending.map_or(false, |p| p < PipelineState::Playing);
        PlayerInfo {
            position,
            duration,
            is_paused,
            volume,
            playback_rate: shared.rate,
            total_video_frames: shared.total_video_frames,
            dropped_video_frames: shared.dropped_video_frames,
            corrupted_video_frames: 0,
            frame_width: shared.frame_width,
            frame_height: shared.frame_height,
            skipped_duplicate_samples: shared.skipped_duplicates,
            pending_samples: shared.pending.len(),
        }
    }

    pub(super) fn set_volume(&self, volume: f64) {
        if !self.codecs.is_present(StreamType::Audio) {
            debug!(player = %self.id, "No audio stream, volume ignored");
            return;
        }
        self.pipeline.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Bounds the pipeline cannot apply yet are re-applied on the next state change
    pub(super) fn set_bounds(&self, bounds: Bounds) {
        if !self.pipeline.set_video_rectangle(bounds) {
            debug!(player = %self.id, ?bounds, "Video sink not ready, bounds pending");
            self.lock_shared().pending_bounds = Some(bounds);
        }
    }
}
