//! DRM gate contract
//!
//! The player never talks to a CDM directly. It asks a [`DrmGate`] whether a
//! key id resolves to a decryption session, decrypts through it, and is told
//! through [`KeyReadyObserver`] when a key becomes usable.
//!
//! Observers are held as `Weak` references so a DRM system never keeps a
//! destroyed player alive; [`KeyObserverRegistry`] implements that
//! bookkeeping for DRM implementations to embed.

use crate::media::{EncryptionInfo, KeyId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError, Weak};
use tracing::trace;
use uuid::Uuid;

/// Opaque decryption session handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receives key-ready notifications from a DRM system
///
/// Called from whatever thread the DRM system notifies on; implementations
/// must hand the work off rather than block.
pub trait KeyReadyObserver: Send + Sync {
    fn on_key_ready(&self, key_id: &KeyId);
}

/// Decryption gate consulted by the player for encrypted samples
pub trait DrmGate: Send + Sync {
    /// Session able to decrypt `key_id`, if the key is usable now
    fn session_for_key(&self, key_id: &KeyId) -> Option<SessionId>;

    /// Decrypt `payload` in place; `false` means the sample is undecodable
    fn decrypt(&self, session: &SessionId, payload: &mut Vec<u8>, encryption: &EncryptionInfo) -> bool;

    /// Keys currently usable
    fn ready_keys(&self) -> Vec<KeyId>;

    fn add_observer(&self, id: Uuid, observer: Weak<dyn KeyReadyObserver>);

    fn remove_observer(&self, id: Uuid);

    /// Resolution hint sent before decrypting video
    fn set_video_resolution(&self, _session: &SessionId, _width: u32, _height: u32) {}
}

/// Observer bookkeeping for [`DrmGate`] implementations
#[derive(Default)]
pub struct KeyObserverRegistry {
    observers: Mutex<HashMap<Uuid, Weak<dyn KeyReadyObserver>>>,
}

impl KeyObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: Uuid, observer: Weak<dyn KeyReadyObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, observer);
    }

    pub fn remove(&self, id: Uuid) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn len(&self) -> usize {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every live observer; returns how many were notified
    ///
    /// Observers are called outside the registry lock so they may add or
    /// remove observers. Dead observers are pruned.
    pub fn notify_key_ready(&self, key_id: &KeyId) -> usize {
        let live: Vec<_> = {
            let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
            observers.retain(|_, observer| observer.strong_count() > 0);
            observers.values().filter_map(Weak::upgrade).collect()
        };

        trace!(key = %key_id, observers = live.len(), "Key ready");
        for observer in &live {
            observer.on_key_ready(key_id);
        }
        live.len()
    }
}

impl fmt::Debug for KeyObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
