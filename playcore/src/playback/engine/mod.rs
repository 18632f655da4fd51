//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: shared state, construction, teardown, pipeline state changes
//! - `write.rs`: sample ingestion, decrypt/push, pending replay
//! - `seek.rs`: seek, rate and position reporting
//! - `bus.rs`: control-thread handlers (bus messages, preroll, watchdog)
//! - `info.rs`: status snapshot, volume and bounds
//!
//! API calls run on the caller's thread under the shared mutex; everything
//! asynchronous runs on the player's control thread.

mod bus;
mod core;
mod info;
mod seek;
mod write;

pub use self::core::PlayerBuilder;
pub use info::PlayerInfo;

use crate::callbacks::PlayerCallbacks;
use crate::media::{Bounds, Codecs, EncodedSample};
use crate::pipeline::Pipeline;
use crate::playback::control::{ControlTask, ControlThread};
use crate::playback::state::PlaybackState;
use crate::registry::PlayerRegistry;
use playcore_common::{MediaTime, StreamType};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use self::core::PlayerCore;

/// A media player bound to one pipeline
///
/// Dropping the player tears it down: scheduled callbacks are cancelled,
/// the pipeline is stopped, a `Destroyed` status is delivered and the
/// control thread is joined before the DRM binding is released.
pub struct Player {
    core: Arc<PlayerCore>,
    control_thread: ControlThread,
    registry: Option<Arc<PlayerRegistry>>,
}

impl Player {
    pub fn builder(codecs: Codecs, pipeline: Arc<dyn Pipeline>, callbacks: Arc<dyn PlayerCallbacks>) -> PlayerBuilder {
        PlayerBuilder::new(codecs, pipeline, callbacks)
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// Hand one encoded sample to the player
    pub fn write_sample(&self, sample: EncodedSample) {
        self.core.write_sample(sample);
    }

    /// No more samples will be written for `stream` (until the next seek)
    pub fn mark_end_of_stream(&self, stream: StreamType) {
        self.core.mark_end_of_stream(stream);
    }

    /// Seek to `position`; status reports carry `ticket` from now on
    pub fn seek(&self, position: MediaTime, ticket: i32) {
        self.core.seek(position, ticket);
    }

    /// Set the playback rate; 0 pauses
    pub fn set_rate(&self, rate: f64) -> bool {
        self.core.apply_rate(rate, true)
    }

    pub fn set_volume(&self, volume: f64) {
        self.core.set_volume(volume);
    }

    pub fn set_bounds(&self, bounds: Bounds) {
        self.core.set_bounds(bounds);
    }

    pub fn info(&self) -> PlayerInfo {
        self.core.info()
    }

    pub fn state(&self) -> PlaybackState {
        self.core.lock_shared().machine.state()
    }

    /// Samples parked in the pending queue
    pub fn pending_sample_count(&self) -> usize {
        self.core.lock_shared().pending.len()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let id = self.core.id;
        if let Some(registry) = &self.registry {
            registry.unregister(id);
        }

        let ticket = self.core.teardown();
        self.core.post(ControlTask::Shutdown { ticket });
        self.control_thread.join();

        if let Some(drm) = &self.core.drm {
            drm.remove_observer(id);
        }
        self.core.lock_shared().pending.clear();
        info!(player = %id, "Player destroyed");
    }
}
