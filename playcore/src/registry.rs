//! Process-wide player registry
//!
//! Players register their control channel on construction and unregister on
//! drop. The host uses the registry to stop every live pipeline at once (for
//! example when the platform suspends media).

use crate::playback::control::{ControlSender, ControlTask};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Mutex<HashMap<Uuid, ControlSender>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, id: Uuid, control: ControlSender) {
        debug!(player = %id, "Registering player");
        self.players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, control);
    }

    pub(crate) fn unregister(&self, id: Uuid) {
        debug!(player = %id, "Unregistering player");
        self.players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask every registered player to stop its pipeline
    ///
    /// Stopped players keep their pipeline at or below `Ready` for the rest
    /// of their lifetime. Returns how many players were reached.
    pub fn force_stop(&self) -> usize {
        let players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        let reached = players
            .values()
            .filter(|control| control.post(ControlTask::ForceStop))
            .count();
        info!(players = reached, "Force stop requested");
        reached
    }
}
