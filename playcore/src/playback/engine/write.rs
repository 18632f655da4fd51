//! Write path - sample ingestion, decrypt/push and pending replay
//!
//! **Responsibilities:**
//! - `write_sample`: ingestion bookkeeping, DRM gating, keep-samples rule
//! - `write_to_pipeline`: secure copy, decrypt, push, needs-data re-arm
//! - `write_pending_samples`: ordered replay of one pending key
//! - Key-ready observer and the out-of-band write wait

use crate::drm::{KeyReadyObserver, SessionId};
use crate::media::{EncodedSample, KeyId, VideoSampleInfo};
use crate::pipeline::PipelineState;
use crate::playback::control::ControlTask;
use crate::playback::pending::{replay_in_order, PendingKey, ReplayReport};
use crate::playback::state::PlaybackState;
use playcore_common::events::PlayerErrorKind;
use playcore_common::{MediaTime, StreamFlags, StreamType};
use std::sync::PoisonError;
use tracing::{debug, error, info, trace, warn};

use super::core::PlayerCore;

impl PlayerCore {
    pub(super) fn write_sample(&self, sample: EncodedSample) {
        let stream = sample.stream;
        if !self.codecs.is_present(stream) {
            warn!(player = %self.id, %stream, "Sample for absent stream dropped");
            return;
        }
        if let (StreamType::Video, Some(info)) = (stream, sample.video_info) {
            self.update_frame_geometry(info);
        }

        let (serial, keep_samples, flushing, start_playback) = {
            let mut shared = self.lock_shared();
            shared.timestamps.record(stream, sample.timestamp);
            let serial = shared.serials[stream];
            shared.serials[stream] += 1;
            let start_playback = shared.timestamps.min_timestamp() == sample.timestamp
                && !shared.watchdog.is_paused_internal()
                && shared.rate > 0.0;
            (
                serial,
                shared.machine.keep_samples(),
                shared.machine.is_flushing(),
                start_playback,
            )
        };
        trace!(player = %self.id, %stream, serial, timestamp = %sample.timestamp, keep_samples, "Write sample");

        if start_playback {
            self.start_playback_if_paused();
        }

        // Without a DRM gate encrypted samples go to the pipeline as they are
        let key = match (&sample.encryption, &self.drm) {
            (Some(encryption), Some(_)) => PendingKey::Key(encryption.key_id.clone()),
            _ => PendingKey::Clear,
        };
        let session = match &key {
            PendingKey::Clear => None,
            PendingKey::Key(key_id) => self.drm.as_ref().and_then(|drm| drm.session_for_key(key_id)),
        };

        if matches!(key, PendingKey::Key(_)) && session.is_none() {
            debug!(player = %self.id, %key, serial, "Key not usable yet, sample parked");
            self.lock_shared().pending.enqueue(key, sample, serial);
            return;
        }

        if keep_samples && flushing {
            debug!(player = %self.id, %key, serial, "Flush in progress, sample held");
            self.lock_shared().pending.enqueue(key, sample, serial);
            return;
        }

        if keep_samples {
            // Pushed now and retained for redelivery after the pending seek or rate change
            self.lock_shared().pending.enqueue(key.clone(), sample.clone(), serial);
        }

        self.wait_for_oob_write();
        self.write_to_pipeline(sample, session.as_ref());

        if keep_samples {
            self.lock_shared().pending.mark_written(&key, stream, serial);
        }
    }

    /// Proactive start once the lagging stream caught up
    fn start_playback_if_paused(&self) {
        let _state_change = self.lock_state_change();
        if !self.may_resume() {
            return;
        }
        let current = self.pipeline.current_state();
        let pending = self.pipeline.pending_state();
        if current <= PipelineState::Paused && pending.map_or(true, |p| p <= PipelineState::Paused) {
            info!(player = %self.id, "Streams in step, starting playback");
            self.change_pipeline_state(PipelineState::Playing);
        }
    }

    fn update_frame_geometry(&self, info: VideoSampleInfo) {
        {
            let mut shared = self.lock_shared();
            if shared.frame_width == info.frame_width && shared.frame_height == info.frame_height {
                return;
            }
            shared.frame_width = info.frame_width;
            shared.frame_height = info.frame_height;
        }
        debug!(player = %self.id, width = info.frame_width, height = info.frame_height, "Video frame size changed");

        if let Some((max_width, max_height)) = self.config.max_video_resolution() {
            if info.frame_width > max_width || info.frame_height > max_height {
                warn!(player = %self.id, width = info.frame_width, height = info.frame_height, "Video resolution above maximum");
                self.post(ControlTask::Error {
                    kind: PlayerErrorKind::Decode,
                    message: format!(
                        "video resolution {}x{} exceeds maximum {}x{}",
                        info.frame_width, info.frame_height, max_width, max_height
                    ),
                });
            }
        }
    }

    /// Block while a key-ready replay is in flight, bounded by the configured timeout
    ///
    /// Writes issued from a callback never wait: the replay is queued behind
    /// the callback on the same thread.
    fn wait_for_oob_write(&self) {
        if self.on_control_thread() {
            return;
        }
        let shared = self.lock_shared();
        let (mut shared, wait) = self
            .oob_write_done
            .wait_timeout_while(shared, self.config.oob_write_timeout(), |s| s.oob_write_pending)
            .unwrap_or_else(PoisonError::into_inner);
        if wait.timed_out() {
            error!(player = %self.id, "Pending sample replay took too long, writing anyway");
            shared.oob_write_pending = false;
        }
    }

    /// Secure copy, decrypt and push one sample, then re-arm needs-data
    ///
    /// Returns `true` when the sample reached the pipeline.
    pub(super) fn write_to_pipeline(&self, mut sample: EncodedSample, session: Option<&SessionId>) -> bool {
        let stream = sample.stream;
        let timestamp = sample.timestamp;
        self.lock_shared().flow.data_written(stream);

        let mut enough_buffer = true;
        if stream == StreamType::Video {
            if let Some(secure_memory) = &self.secure_memory {
                if !secure_memory.copy_in(&mut sample) {
                    error!(player = %self.id, %timestamp, "Failed to move sample into secure memory");
                }
                if !secure_memory.has_headroom() {
                    enough_buffer = false;
                }
            }
        }

        let mut decrypted = true;
        if let (Some(session), Some(drm)) = (session, &self.drm) {
            if stream == StreamType::Video {
                let (width, height) = {
                    let shared = self.lock_shared();
                    (shared.frame_width, shared.frame_height)
                };
                if width > 0 && height > 0 {
                    drm.set_video_resolution(session, width, height);
                }
            }
            let EncodedSample { payload, encryption, .. } = &mut sample;
            if let Some(encryption) = encryption.as_ref() {
                decrypted = drm.decrypt(session, payload, encryption);
            }
            if !decrypted {
                error!(player = %self.id, %stream, %timestamp, %session, "Decryption failed, sample dropped");
                self.post(ControlTask::Error {
                    kind: PlayerErrorKind::Decode,
                    message: format!("decryption failed for {} sample at {}", stream, timestamp),
                });
            }
        }

        let pushed = decrypted && self.pipeline.push_sample(sample);
        if decrypted && !pushed {
            warn!(player = %self.id, %stream, %timestamp, "Pipeline rejected sample");
        }

        let mut shared = self.lock_shared();
        if pushed {
            shared.timestamps.record(stream, timestamp);
            if stream == StreamType::Video {
                shared.total_video_frames += 1;
            }
        }

        if shared.machine.state().is_initial_phase() {
            return pushed;
        }
        if shared.flow.has_enough(stream) || !enough_buffer {
            trace!(player = %self.id, %stream, "Has enough data");
            return pushed;
        }

        if stream == StreamType::Video {
            let position = shared.cached_position;
            let seek_target = shared.machine.seek_position();
            let past_target = seek_target.is_max() || position >= seek_target;
            if position != MediaTime::ZERO
                && past_target
                && timestamp > position.saturating_add(self.config.video_lookahead())
            {
                if shared.video_request_timer.is_none() {
                    debug!(player = %self.id, %timestamp, %position, "Video far ahead, delaying data request");
                    shared.video_request_timer = Some(
                        self.scheduler
                            .schedule(self.config.video_lookahead_retry(), ControlTask::DelayedVideoRequest),
                    );
                }
                return pushed;
            }
        }

        let mut streams = StreamFlags::NONE;
        streams[stream] = true;
        self.request_data(&mut shared, streams);
        pushed
    }

    /// Replay the pending samples of `key` in serial order
    ///
    /// An unresolvable key leaves its samples parked. While a seek or rate
    /// change is pending the replayed samples are retained, unless the seek
    /// ticket changed during the replay.
    pub(super) fn write_pending_samples(&self, key: &PendingKey) -> ReplayReport {
        let (mut samples, keep_samples, ticket) = {
            let mut shared = self.lock_shared();
            (
                shared.pending.take(key),
                shared.machine.keep_samples(),
                shared.machine.ticket(),
            )
        };
        if samples.is_empty() {
            return ReplayReport::default();
        }

        let session = match key {
            PendingKey::Clear => None,
            PendingKey::Key(key_id) => match &self.drm {
                None => None,
                Some(drm) => match drm.session_for_key(key_id) {
                    Some(session) => Some(session),
                    None => {
                        debug!(player = %self.id, %key, "Key still not usable, samples stay parked");
                        self.lock_shared().pending.restore(key.clone(), samples);
                        return ReplayReport::default();
                    }
                },
            },
        };

        let report = replay_in_order(&mut samples, |pending| {
            self.write_to_pipeline(pending.sample().clone(), session.as_ref())
        });

        let mut shared = self.lock_shared();
        shared.skipped_duplicates += report.skipped_duplicates as u64;
        if keep_samples {
            if shared.machine.ticket() == ticket {
                debug!(player = %self.id, %key, samples = samples.len(), "Retaining replayed samples");
                shared.pending.restore(key.clone(), samples);
            } else {
                debug!(player = %self.id, %key, "Seek ticket changed during replay, dropping retained samples");
            }
        }
        info!(
            player = %self.id,
            %key,
            written = report.written,
            skipped = report.skipped_duplicates,
            failed = report.failed,
            "Pending samples replayed"
        );
        report
    }

    /// Replay clear samples and every currently usable key
    pub(super) fn replay_ready_samples(&self) {
        self.write_pending_samples(&PendingKey::Clear);
        if let Some(drm) = &self.drm {
            for key in drm.ready_keys() {
                self.write_pending_samples(&PendingKey::Key(key));
            }
        }
    }

    /// Control-thread side of a key-ready notification
    pub(super) fn replay_for_key_ready(&self, key: KeyId) {
        self.write_pending_samples(&PendingKey::Key(key));
        self.finish_oob_write();
    }

    fn finish_oob_write(&self) {
        self.lock_shared().oob_write_pending = false;
        self.oob_write_done.notify_all();
    }

    pub(super) fn mark_end_of_stream(&self, stream: StreamType) {
        if !self.codecs.is_present(stream) {
            warn!(player = %self.id, %stream, "End of stream for absent stream ignored");
            return;
        }
        {
            let mut shared = self.lock_shared();
            if shared.machine.state() == PlaybackState::PrerollAfterSeek {
                debug!(player = %self.id, %stream, "Ignoring end of stream while prerolling after seek");
                return;
            }
            shared.flow.mark_end_of_stream(stream);
            shared.timestamps.record(stream, MediaTime::MAX);
        }
        info!(player = %self.id, %stream, "End of stream");
        self.pipeline.end_of_stream(stream);
    }
}

impl KeyReadyObserver for PlayerCore {
    fn on_key_ready(&self, key_id: &KeyId) {
        debug!(player = %self.id, key = %key_id, "Key ready");
        self.lock_shared().oob_write_pending = true;
        if !self.control.post(ControlTask::KeyReady(key_id.clone())) {
            self.finish_oob_write();
        }
    }
}
