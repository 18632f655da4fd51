//! Control serializer
//!
//! Each player owns one control thread running a single-threaded tokio
//! runtime. Everything that is not a direct API call is funnelled through it
//! as a [`ControlTask`]: pipeline bus messages, key-ready replays, deferred
//! timers, outbound callbacks and the buffer-health watchdog tick. Tasks run
//! strictly one at a time in posting order.
//!
//! **Delayed work:** [`Scheduler::schedule`] posts a task after a delay and
//! returns an [`AbortHandle`] so the caller can cancel it (teardown, force
//! stop, rate 0).

use crate::error::{Error, Result};
use crate::media::KeyId;
use crate::pipeline::PipelineMessage;
use playcore_common::events::{PlayerErrorKind, PlayerState};
use playcore_common::StreamType;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, trace};

/// Work item executed on the control thread
#[derive(Debug, Clone)]
pub enum ControlTask {
    /// Report a player state change
    PlayerStatus { state: PlayerState, ticket: i32 },
    /// Report that a stream needs data
    NeedsData { stream: StreamType, ticket: i32 },
    /// Report an error
    Error { kind: PlayerErrorKind, message: String },
    /// Pipeline bus message
    Pipeline(PipelineMessage),
    /// A key became usable: replay its pending samples
    KeyReady(KeyId),
    /// A flushing seek was issued: replay samples held during the flush
    ReplayAfterFlush,
    /// A deferred preroll became unblocked
    CompletePreroll,
    /// Deferred video needs-data request
    DelayedVideoRequest,
    /// Deferred source configuration
    FinishSourceSetup,
    /// Stop the pipeline on behalf of the player registry
    ForceStop,
    /// Report destruction and stop the control loop
    Shutdown { ticket: i32 },
}

impl ControlTask {
    pub fn name(&self) -> &'static str {
        match self {
            ControlTask::PlayerStatus { .. } => "PlayerStatus",
            ControlTask::NeedsData { .. } => "NeedsData",
            ControlTask::Error { .. } => "Error",
            ControlTask::Pipeline(_) => "Pipeline",
            ControlTask::KeyReady(_) => "KeyReady",
            ControlTask::ReplayAfterFlush => "ReplayAfterFlush",
            ControlTask::CompletePreroll => "CompletePreroll",
            ControlTask::DelayedVideoRequest => "DelayedVideoRequest",
            ControlTask::FinishSourceSetup => "FinishSourceSetup",
            ControlTask::ForceStop => "ForceStop",
            ControlTask::Shutdown { .. } => "Shutdown",
        }
    }
}

/// Executes control tasks; implemented by the player core
pub trait ControlHandler: Send + Sync + 'static {
    fn handle(&self, task: ControlTask);

    /// Periodic buffer-health check
    fn watchdog_tick(&self);
}

/// Posting side of a player's control channel
#[derive(Clone, Debug)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<ControlTask>,
}

impl ControlSender {
    pub fn channel() -> (ControlSender, mpsc::UnboundedReceiver<ControlTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ControlSender { tx }, rx)
    }

    /// Queue a task; `false` once the control loop has exited
    pub fn post(&self, task: ControlTask) -> bool {
        trace!(task = task.name(), "Posting control task");
        self.tx.send(task).is_ok()
    }
}

/// Delayed task posting on the control runtime
#[derive(Clone, Debug)]
pub struct Scheduler {
    handle: Handle,
    sender: ControlSender,
}

impl Scheduler {
    pub fn new(handle: Handle, sender: ControlSender) -> Self {
        Self { handle, sender }
    }

    /// Post `task` after `delay`
    pub fn schedule(&self, delay: Duration, task: ControlTask) -> AbortHandle {
        let sender = self.sender.clone();
        self.handle
            .spawn(async move {
                tokio::time::sleep(delay).await;
                sender.post(task);
            })
            .abort_handle()
    }
}

/// Build the single-threaded runtime driving a control thread
pub fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| Error::ControlThread(format!("failed to build runtime: {}", e)))
}

/// Handle to a running control thread
#[derive(Debug)]
pub struct ControlThread {
    join: Option<JoinHandle<()>>,
}

impl ControlThread {
    /// Start the control loop on a dedicated OS thread
    pub fn spawn(
        name: String,
        runtime: Runtime,
        rx: mpsc::UnboundedReceiver<ControlTask>,
        handler: Arc<dyn ControlHandler>,
        watchdog_interval: Duration,
    ) -> Result<Self> {
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || {
                runtime.block_on(control_loop(rx, handler, watchdog_interval));
                debug!("Control loop exited");
            })
            .map_err(|e| Error::ControlThread(format!("failed to spawn control thread: {}", e)))?;
        Ok(Self { join: Some(join) })
    }

    /// Id of the control thread, until it is joined
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.join.as_ref().map(|join| join.thread().id())
    }

    /// Wait for the control loop to exit
    ///
    /// Joining from the control thread itself (player dropped inside a
    /// callback) detaches instead.
    pub fn join(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        if join.thread().id() == thread::current().id() {
            debug!("Player dropped on its own control thread, detaching");
            return;
        }
        if join.join().is_err() {
            error!("Control thread panicked");
        }
    }
}

async fn control_loop(
    mut rx: mpsc::UnboundedReceiver<ControlTask>,
    handler: Arc<dyn ControlHandler>,
    watchdog_interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + watchdog_interval, watchdog_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            task = rx.recv() => match task {
                Some(task @ ControlTask::Shutdown { .. }) => {
                    handler.handle(task);
                    break;
                }
                Some(task) => handler.handle(task),
                None => break,
            },
            _ = ticker.tick() => handler.watchdog_tick(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        tasks: Mutex<Vec<String>>,
        ticks: AtomicUsize,
    }

    impl ControlHandler for Recorder {
        fn handle(&self, task: ControlTask) {
            self.tasks.lock().unwrap().push(task.name().to_string());
        }

        fn watchdog_tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn start(interval: Duration) -> (Arc<Recorder>, ControlSender, Scheduler, ControlThread) {
        let runtime = build_runtime().unwrap();
        let (sender, rx) = ControlSender::channel();
        let scheduler = Scheduler::new(runtime.handle().clone(), sender.clone());
        let recorder = Arc::new(Recorder::default());
        let thread = ControlThread::spawn("control-test".into(), runtime, rx, recorder.clone(), interval).unwrap();
        (recorder, sender, scheduler, thread)
    }

    #[test]
    fn test_tasks_run_in_posting_order() {
        let (recorder, sender, _scheduler, mut thread) = start(Duration::from_secs(3600));

        sender.post(ControlTask::ReplayAfterFlush);
        sender.post(ControlTask::ForceStop);
        sender.post(ControlTask::Shutdown { ticket: 0 });
        thread.join();

        let tasks = recorder.tasks.lock().unwrap().clone();
        assert_eq!(tasks, vec!["ReplayAfterFlush", "ForceStop", "Shutdown"]);
        assert!(!sender.post(ControlTask::ForceStop));
    }

    #[test]
    fn test_scheduled_task_is_delivered() {
        let (recorder, sender, scheduler, mut thread) = start(Duration::from_secs(3600));

        scheduler.schedule(Duration::from_millis(20), ControlTask::FinishSourceSetup);
        std::thread::sleep(Duration::from_millis(200));
        sender.post(ControlTask::Shutdown { ticket: 0 });
        thread.join();

        let tasks = recorder.tasks.lock().unwrap().clone();
        assert_eq!(tasks, vec!["FinishSourceSetup", "Shutdown"]);
    }

    #[test]
    fn test_aborted_task_is_not_delivered() {
        let (recorder, sender, scheduler, mut thread) = start(Duration::from_secs(3600));

        let handle = scheduler.schedule(Duration::from_millis(50), ControlTask::DelayedVideoRequest);
        handle.abort();
        std::thread::sleep(Duration::from_millis(150));
        sender.post(ControlTask::Shutdown { ticket: 0 });
        thread.join();

        let tasks = recorder.tasks.lock().unwrap().clone();
        assert_eq!(tasks, vec!["Shutdown"]);
    }

    #[test]
    fn test_watchdog_ticks() {
        let (recorder, sender, _scheduler, mut thread) = start(Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(120));
        sender.post(ControlTask::Shutdown { ticket: 0 });
        thread.join();

        assert!(recorder.ticks.load(Ordering::SeqCst) >= 3);
    }
}
