//! Player core - shared state, construction and lifecycle
//!
//! **Responsibilities:**
//! - `PlayerCore` struct definition and the state guarded by its mutex
//! - Construction (`PlayerBuilder::build`) and teardown
//! - Pipeline state changes (honouring force stop)
//! - Needs-data notification plumbing shared by the other engine modules

use crate::callbacks::PlayerCallbacks;
use crate::config::PlayerConfig;
use crate::drm::DrmGate;
use crate::error::{Error, Result};
use crate::media::{Bounds, Codecs};
use crate::pipeline::{BusSender, Pipeline, PipelineState, SecureMemory};
use crate::playback::control::{build_runtime, ControlHandler, ControlSender, ControlTask, ControlThread, Scheduler};
use crate::playback::flow::FlowController;
use crate::playback::pending::PendingQueue;
use crate::playback::state::PlaybackStateMachine;
use crate::playback::timestamps::TimestampTracker;
use crate::playback::watchdog::{BufferHealthWatchdog, WatchdogThresholds};
use crate::registry::PlayerRegistry;
use playcore_common::events::{PlayerState, INITIAL_TICKET};
use playcore_common::{MediaTime, PerStream, StreamFlags};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Player;

/// State shared between API callers and the control thread
pub(super) struct SharedState {
    pub(super) machine: PlaybackStateMachine,
    pub(super) flow: FlowController,
    pub(super) timestamps: TimestampTracker,
    pub(super) pending: PendingQueue,
    pub(super) watchdog: BufferHealthWatchdog,

    /// Caller-requested playback rate
    pub(super) rate: f64,

    /// Last positive rate before the current one
    pub(super) pre_rate: f64,

    /// Next ingestion serial per stream
    pub(super) serials: PerStream<u64>,

    pub(super) total_video_frames: u64,
    pub(super) dropped_video_frames: u64,
    pub(super) frame_width: u32,
    pub(super) frame_height: u32,

    /// Last position reported while playing
    pub(super) cached_position: MediaTime,

    /// Bounds the pipeline could not apply yet
    pub(super) pending_bounds: Option<Bounds>,

    /// Deferred video needs-data request
    pub(super) video_request_timer: Option<AbortHandle>,

    /// A key-ready replay is queued or running on the control thread
    pub(super) oob_write_pending: bool,

    /// Samples skipped by the duplicate-timestamp guard
    pub(super) skipped_duplicates: u64,
}

impl SharedState {
    fn new(present: StreamFlags, config: &PlayerConfig) -> Self {
        Self {
            machine: PlaybackStateMachine::new(),
            flow: FlowController::new(present),
            timestamps: TimestampTracker::new(present),
            pending: PendingQueue::new(),
            watchdog: BufferHealthWatchdog::new(WatchdogThresholds::from(config)),
            rate: 1.0,
            pre_rate: 1.0,
            serials: PerStream::splat(0),
            total_video_frames: 0,
            dropped_video_frames: 0,
            frame_width: 0,
            frame_height: 0,
            cached_position: MediaTime::ZERO,
            pending_bounds: None,
            video_request_timer: None,
            oob_write_pending: false,
            skipped_duplicates: 0,
        }
    }
}

/// Engine internals shared by the `Player` handle and its control thread
pub(crate) struct PlayerCore {
    pub(super) id: Uuid,
    pub(super) config: PlayerConfig,
    pub(super) codecs: Codecs,
    pub(super) pipeline: Arc<dyn Pipeline>,
    pub(super) drm: Option<Arc<dyn DrmGate>>,
    pub(super) secure_memory: Option<Arc<dyn SecureMemory>>,
    pub(super) callbacks: Arc<dyn PlayerCallbacks>,
    pub(super) control: ControlSender,
    pub(super) scheduler: Scheduler,
    pub(super) shared: Mutex<SharedState>,

    /// Signalled when a key-ready replay finishes
    pub(super) oob_write_done: Condvar,

    /// Scheduled source setup; separate lock, touched from teardown
    pub(super) source_setup: Mutex<Option<AbortHandle>>,

    /// Held across a caller rate change and any internal resume to `Playing`
    ///
    /// Lock order: `state_change` before `shared`.
    pub(super) state_change: Mutex<()>,

    /// Set once the control thread is running
    pub(super) control_thread: OnceLock<ThreadId>,

    /// Set once by force stop; never cleared
    pub(super) force_stopped: AtomicBool,

    /// Origin of the watchdog's monotonic clock
    pub(super) started: Instant,
}

impl PlayerCore {
    pub(super) fn lock_shared(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn lock_source_setup(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.source_setup.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn lock_state_change(&self) -> MutexGuard<'_, ()> {
        self.state_change.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether an internal resume may move the pipeline to `Playing`
    ///
    /// Only meaningful with the state-change lock held: the caller's rate
    /// cannot change between this check and the state change.
    pub(super) fn may_resume(&self) -> bool {
        let shared = self.lock_shared();
        shared.rate > 0.0 && !shared.watchdog.is_paused_internal()
    }

    /// Running on this player's control thread (inside a callback or handler)
    pub(super) fn on_control_thread(&self) -> bool {
        self.control_thread.get() == Some(&thread::current().id())
    }

    pub(super) fn post(&self, task: ControlTask) {
        if !self.control.post(task) {
            debug!(player = %self.id, "Control loop gone, task dropped");
        }
    }

    pub(super) fn post_status(&self, state: PlayerState, ticket: i32) {
        self.post(ControlTask::PlayerStatus { state, ticket });
    }

    /// Monotonic clock for the watchdog
    pub(super) fn monotonic_now(&self) -> MediaTime {
        MediaTime::from(self.started.elapsed())
    }

    /// Move the pipeline to `state`
    ///
    /// After a force stop, transitions above `Ready` are refused.
    pub(super) fn change_pipeline_state(&self, state: PipelineState) -> bool {
        if self.force_stopped.load(Ordering::SeqCst) && state > PipelineState::Ready {
            info!(player = %self.id, %state, "Pipeline force stopped, ignoring state change");
            return false;
        }
        debug!(player = %self.id, %state, "Changing pipeline state");
        let accepted = self.pipeline.set_state(state);
        if !accepted {
            warn!(player = %self.id, %state, "Pipeline refused state change");
        }
        accepted
    }

    /// Post needs-data callbacks for `emit` at the current ticket
    pub(super) fn notify_needs_data(&self, shared: &SharedState, emit: StreamFlags) {
        let ticket = shared.machine.ticket();
        for stream in emit.streams() {
            debug!(player = %self.id, %stream, ticket, "Requesting data");
            self.post(ControlTask::NeedsData { stream, ticket });
        }
    }

    /// Mark `streams` as needing data and notify the ones not yet notified
    pub(super) fn request_data(&self, shared: &mut SharedState, streams: StreamFlags) {
        let emit = shared.flow.request(streams);
        self.notify_needs_data(shared, emit);
    }

    /// Cancel timers and stop the pipeline; returns the final ticket
    pub(super) fn teardown(&self) -> i32 {
        let (timer, ticket) = {
            let mut shared = self.lock_shared();
            shared.machine.shut_down();
            (shared.video_request_timer.take(), shared.machine.ticket())
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(setup) = self.lock_source_setup().take() {
            setup.abort();
        }
        self.change_pipeline_state(PipelineState::Null);
        ticket
    }
}

/// Builder for [`Player`]
pub struct PlayerBuilder {
    codecs: Codecs,
    pipeline: Arc<dyn Pipeline>,
    callbacks: Arc<dyn PlayerCallbacks>,
    drm: Option<Arc<dyn DrmGate>>,
    secure_memory: Option<Arc<dyn SecureMemory>>,
    registry: Option<Arc<PlayerRegistry>>,
    config: PlayerConfig,
}

impl PlayerBuilder {
    pub(super) fn new(codecs: Codecs, pipeline: Arc<dyn Pipeline>, callbacks: Arc<dyn PlayerCallbacks>) -> Self {
        Self {
            codecs,
            pipeline,
            callbacks,
            drm: None,
            secure_memory: None,
            registry: None,
            config: PlayerConfig::default(),
        }
    }

    /// DRM gate for encrypted content
    pub fn drm(mut self, drm: Arc<dyn DrmGate>) -> Self {
        self.drm = Some(drm);
        self
    }

    /// Secure buffer pool for protected video
    pub fn secure_memory(mut self, secure_memory: Arc<dyn SecureMemory>) -> Self {
        self.secure_memory = Some(secure_memory);
        self
    }

    pub fn registry(mut self, registry: Arc<PlayerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the control thread and bring the pipeline to `Ready`
    pub fn build(self) -> Result<Player> {
        self.config.validate()?;
        if !self.codecs.present().any() {
            return Err(Error::InvalidState("player needs an audio or a video stream".into()));
        }

        let id = Uuid::new_v4();
        let runtime = build_runtime()?;
        let (control, rx) = ControlSender::channel();
        let scheduler = Scheduler::new(runtime.handle().clone(), control.clone());
        let watchdog_interval = self.config.watchdog_interval();

        let mut shared = SharedState::new(self.codecs.present(), &self.config);
        shared.machine.initialize();

        let core = Arc::new(PlayerCore {
            id,
            config: self.config,
            codecs: self.codecs,
            pipeline: self.pipeline,
            drm: self.drm,
            secure_memory: self.secure_memory,
            callbacks: self.callbacks,
            control: control.clone(),
            scheduler,
            shared: Mutex::new(shared),
            oob_write_done: Condvar::new(),
            source_setup: Mutex::new(None),
            state_change: Mutex::new(()),
            control_thread: OnceLock::new(),
            force_stopped: AtomicBool::new(false),
            started: Instant::now(),
        });

        let handler: Arc<dyn ControlHandler> = core.clone();
        let thread_name = format!("playcore-{}", &id.simple().to_string()[..8]);
        let control_thread = ControlThread::spawn(thread_name, runtime, rx, handler, watchdog_interval)?;
        // Set before the first task is posted
        if let Some(thread_id) = control_thread.thread_id() {
            let _ = core.control_thread.set(thread_id);
        }

        core.post_status(PlayerState::Initialized, INITIAL_TICKET);
        core.pipeline.attach_bus(BusSender::new(control.clone()));
        if let Some(drm) = &core.drm {
            let observer = Arc::downgrade(&core);
            drm.add_observer(id, observer);
        }
        if let Some(registry) = &self.registry {
            registry.register(id, control);
        }
        core.change_pipeline_state(PipelineState::Ready);

        info!(player = %id, codecs = ?core.codecs, "Player created");
        Ok(Player {
            core,
            control_thread,
            registry: self.registry,
        })
    }
}
