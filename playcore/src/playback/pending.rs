//! DRM-gated pending sample queue
//!
//! Samples that cannot be pushed yet (key not usable, flush in progress) or
//! that must be redelivered after a seek or rate change are parked here,
//! grouped by the key they wait for. Each sample carries a per-stream serial
//! assigned at ingestion so a replay can restore the original write order.
//!
//! **Replay rules:**
//! - Samples are replayed in ascending serial order
//! - A sample whose timestamp equals the previously replayed sample of the
//!   same stream is skipped (the pipeline would reject the duplicate)
//! - Replayed samples are marked written; whether they are dropped or kept
//!   for another redelivery is the caller's decision

use crate::media::{EncodedSample, KeyId};
use playcore_common::{MediaTime, PerStream, StreamType};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Key a pending sample waits for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingKey {
    /// Unencrypted samples
    Clear,
    /// Samples encrypted with this key
    Key(KeyId),
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKey::Clear => write!(f, "clear"),
            PendingKey::Key(key) => write!(f, "{}", key),
        }
    }
}

/// A parked sample
#[derive(Debug, Clone)]
pub struct PendingSample {
    sample: EncodedSample,
    serial: u64,
    written: bool,
}

impl PendingSample {
    pub fn new(sample: EncodedSample, serial: u64) -> Self {
        Self {
            sample,
            serial,
            written: false,
        }
    }

    pub fn sample(&self) -> &EncodedSample {
        &self.sample
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn stream(&self) -> StreamType {
        self.sample.stream
    }

    pub fn timestamp(&self) -> MediaTime {
        self.sample.timestamp
    }

    /// Pushed at least once
    pub fn is_written(&self) -> bool {
        self.written
    }

    pub fn mark_written(&mut self) {
        self.written = true;
    }
}

/// Pending samples grouped by key
#[derive(Debug, Default)]
pub struct PendingQueue {
    lists: HashMap<PendingKey, Vec<PendingSample>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, key: PendingKey, sample: EncodedSample, serial: u64) {
        trace!(key = %key, serial, stream = %sample.stream, "Sample parked");
        self.lists.entry(key).or_default().push(PendingSample::new(sample, serial));
    }

    /// Remove and return the list for `key`
    pub fn take(&mut self, key: &PendingKey) -> Vec<PendingSample> {
        self.lists.remove(key).unwrap_or_default()
    }

    /// Put samples back after a replay
    ///
    /// Samples parked while the list was out are kept; ordering is restored
    /// by serial at the next replay.
    pub fn restore(&mut self, key: PendingKey, samples: Vec<PendingSample>) {
        if samples.is_empty() {
            return;
        }
        self.lists.entry(key).or_default().extend(samples);
    }

    /// Mark the sample with `serial` on `stream` as written
    pub fn mark_written(&mut self, key: &PendingKey, stream: StreamType, serial: u64) -> bool {
        let Some(list) = self.lists.get_mut(key) else {
            return false;
        };
        match list.iter_mut().find(|s| s.serial == serial && s.stream() == stream) {
            Some(sample) => {
                sample.mark_written();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &PendingKey) -> &[PendingSample] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of parked samples
    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

/// Outcome of one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub written: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
}

/// Replay `samples` through `write` in ascending serial order
///
/// `write` returns `false` when the sample could not be pushed; failed
/// samples are still marked written so a failure is not retried forever.
pub fn replay_in_order<F>(samples: &mut [PendingSample], mut write: F) -> ReplayReport
where
    F: FnMut(&PendingSample) -> bool,
{
    samples.sort_by_key(|s| s.serial);

    let mut report = ReplayReport::default();
    let mut previous: PerStream<Option<MediaTime>> = PerStream::splat(None);

    for pending in samples.iter_mut() {
        let stream = pending.stream();
        if previous[stream] == Some(pending.timestamp()) {
            trace!(serial = pending.serial, stream = %stream, "Skipping duplicate timestamp");
            report.skipped_duplicates += 1;
            continue;
        }
        previous[stream] = Some(pending.timestamp());

        if write(pending) {
            report.written += 1;
        } else {
            report.failed += 1;
        }
        pending.mark_written();
    }
    report
}
