//! Per-stream maximum pushed timestamp tracking
//!
//! The tracker answers two questions for the rest of the engine: how far
//! ahead of the playback position each stream has been fed (buffer health)
//! and which stream is furthest behind (proactive start). A stream that
//! reached end-of-stream is recorded at [`MediaTime::MAX`] so it never holds
//! the minimum back.

use playcore_common::{MediaTime, PerStream, StreamFlags, StreamType};

#[derive(Debug, Clone)]
pub struct TimestampTracker {
    present: StreamFlags,
    max: PerStream<MediaTime>,
    min: MediaTime,
}

impl TimestampTracker {
    pub fn new(present: StreamFlags) -> Self {
        Self {
            present,
            max: PerStream::splat(MediaTime::ZERO),
            min: MediaTime::MAX,
        }
    }

    /// Record a pushed timestamp; maxima never decrease
    pub fn record(&mut self, stream: StreamType, timestamp: MediaTime) {
        if timestamp > self.max[stream] {
            self.max[stream] = timestamp;
        }
        self.recompute_min();
    }

    fn recompute_min(&mut self) {
        if let Some(lowest) = self.present.streams().map(|stream| self.max[stream]).min() {
            self.min = lowest;
        }
    }

    #[cfg(test)]
    pub fn max_timestamp(&self, stream: StreamType) -> MediaTime {
        self.max[stream]
    }

    pub fn max_timestamps(&self) -> PerStream<MediaTime> {
        self.max
    }

    /// Minimum of the per-stream maxima over the present streams
    ///
    /// [`MediaTime::MAX`] until the first record.
    pub fn min_timestamp(&self) -> MediaTime {
        self.min
    }
}
