//! Player harness over the simulated pipeline

use playcore::sim::{SimulatedPipeline, StaticDrmGate};
use playcore::{ChannelCallbacks, Codecs, Pipeline, Player, PlayerConfig, PlayerEvent, PlayerRegistry, PlayerState};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound for anything the control thread is expected to do
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration with the watchdog effectively disabled and no settle delay
pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        watchdog_interval_ms: 3_600_000,
        source_setup_delay_ms: 10,
        seek_settle_delay_ms: 0,
        ..PlayerConfig::default()
    }
}

/// Poll `condition` until it holds or [`EVENT_TIMEOUT`] passes
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub struct TestPlayer {
    pub player: Player,
    pub pipeline: Arc<SimulatedPipeline>,
    pub drm: Arc<StaticDrmGate>,
    pub registry: Arc<PlayerRegistry>,
    events: Receiver<PlayerEvent>,
    history: Vec<PlayerEvent>,
}

impl TestPlayer {
    /// Player over an auto-prerolling pipeline with the test configuration
    pub fn new(codecs: Codecs) -> Self {
        Self::with(codecs, SimulatedPipeline::new(), test_config())
    }

    pub fn with(codecs: Codecs, pipeline: SimulatedPipeline, config: PlayerConfig) -> Self {
        let pipeline = Arc::new(pipeline);
        Self::assemble(codecs, pipeline.clone(), pipeline, config, true)
    }

    /// Player driving `driver`, a wrapper around `pipeline`
    pub fn over(
        codecs: Codecs,
        pipeline: Arc<SimulatedPipeline>,
        driver: Arc<dyn Pipeline>,
        config: PlayerConfig,
    ) -> Self {
        Self::assemble(codecs, pipeline, driver, config, true)
    }

    /// Player built without a DRM gate; `drm` is not attached
    pub fn without_drm(codecs: Codecs) -> Self {
        let pipeline = Arc::new(SimulatedPipeline::new());
        Self::assemble(codecs, pipeline.clone(), pipeline, test_config(), false)
    }

    fn assemble(
        codecs: Codecs,
        pipeline: Arc<SimulatedPipeline>,
        driver: Arc<dyn Pipeline>,
        config: PlayerConfig,
        attach_drm: bool,
    ) -> Self {
        let drm = Arc::new(StaticDrmGate::new());
        let registry = Arc::new(PlayerRegistry::new());
        let (callbacks, events) = ChannelCallbacks::new();

        let mut builder = Player::builder(codecs, driver, callbacks)
            .registry(registry.clone())
            .config(config);
        if attach_drm {
            builder = builder.drm(drm.clone());
        }
        let player = builder.build().expect("player should build");

        Self {
            player,
            pipeline,
            drm,
            registry,
            events,
            history: Vec::new(),
        }
    }

    /// Auto-prerolling player that completed its initial seek (ticket 1)
    pub fn presenting(codecs: Codecs) -> Self {
        Self::presenting_with(codecs, test_config())
    }

    pub fn presenting_with(codecs: Codecs, config: PlayerConfig) -> Self {
        let mut test = Self::with(codecs, SimulatedPipeline::new(), config);
        test.start_presenting();
        test
    }

    /// Initial seek (ticket 1) and wait for the preroll to complete
    pub fn start_presenting(&mut self) {
        self.player.seek(playcore::MediaTime::ZERO, 1);
        self.wait_for_state(PlayerState::Presenting, 1);
    }

    /// Wait for the first event matching `predicate`, recording everything seen
    pub fn wait_for_event(&mut self, mut predicate: impl FnMut(&PlayerEvent) -> bool) -> PlayerEvent {
        if let Some(event) = self.history.iter().find(|e| predicate(e)) {
            return event.clone();
        }
        let deadline = Instant::now() + EVENT_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => {
                    self.history.push(event.clone());
                    if predicate(&event) {
                        return event;
                    }
                }
                Err(_) => panic!("timed out waiting for event; seen {:#?}", self.history),
            }
        }
    }

    pub fn wait_for_state(&mut self, state: PlayerState, ticket: i32) -> PlayerEvent {
        self.wait_for_event(|event| {
            matches!(event, PlayerEvent::PlayerStateChanged { state: s, ticket: t, .. } if *s == state && *t == ticket)
        })
    }

    pub fn wait_for_error(&mut self) -> PlayerEvent {
        self.wait_for_event(|event| matches!(event, PlayerEvent::Error { .. }))
    }

    /// Wait until `count` error events have been received in total
    pub fn wait_for_errors(&mut self, count: usize) {
        let mut seen = 0;
        self.wait_for_event(|event| {
            if matches!(event, PlayerEvent::Error { .. }) {
                seen += 1;
            }
            seen >= count
        });
    }

    /// Every event received so far
    pub fn history(&mut self) -> &[PlayerEvent] {
        self.history.extend(self.events.try_iter());
        &self.history
    }

    /// Player state reports received so far, in order
    pub fn states(&mut self) -> Vec<(PlayerState, i32)> {
        self.history()
            .iter()
            .filter_map(|event| match event {
                PlayerEvent::PlayerStateChanged { state, ticket, .. } => Some((*state, *ticket)),
                _ => None,
            })
            .collect()
    }

    /// Drop the player and return every event it ever delivered
    pub fn shutdown(self) -> Vec<PlayerEvent> {
        let TestPlayer {
            player,
            events,
            mut history,
            ..
        } = self;
        drop(player);
        history.extend(events.try_iter());
        history
    }
}
