//! Static-key DRM gate
//!
//! Keys are granted explicitly; granting notifies the registered players the
//! way a license response would. "Encryption" is a byte-wise XOR so tests can
//! check that decrypted payloads reach the pipeline.

use crate::drm::{DrmGate, KeyObserverRegistry, KeyReadyObserver, SessionId};
use crate::media::{EncryptionInfo, KeyId};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info};
use uuid::Uuid;

const XOR_MASK: u8 = 0xa5;

#[derive(Default)]
struct KeyTable {
    sessions: HashMap<KeyId, SessionId>,
    failing: HashSet<KeyId>,
    decrypt_calls: usize,
    resolution_hints: Vec<(u32, u32)>,
}

#[derive(Default)]
pub struct StaticDrmGate {
    keys: Mutex<KeyTable>,
    observers: KeyObserverRegistry,
}

impl StaticDrmGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, KeyTable> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scramble a payload the way [`DrmGate::decrypt`] expects it
    pub fn encrypt(payload: &[u8]) -> Vec<u8> {
        payload.iter().map(|b| b ^ XOR_MASK).collect()
    }

    /// Make `key` usable and notify observers
    pub fn grant_key(&self, key: KeyId, session: SessionId) {
        info!(key = %key, %session, "Key granted");
        self.lock().sessions.insert(key.clone(), session);
        self.observers.notify_key_ready(&key);
    }

    pub fn revoke_key(&self, key: &KeyId) {
        debug!(key = %key, "Key revoked");
        self.lock().sessions.remove(key);
    }

    /// Every decrypt with `key` fails from now on
    pub fn fail_decrypt(&self, key: KeyId) {
        self.lock().failing.insert(key);
    }

    pub fn decrypt_calls(&self) -> usize {
        self.lock().decrypt_calls
    }

    pub fn resolution_hints(&self) -> Vec<(u32, u32)> {
        self.lock().resolution_hints.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl DrmGate for StaticDrmGate {
    fn session_for_key(&self, key_id: &KeyId) -> Option<SessionId> {
        self.lock().sessions.get(key_id).cloned()
    }

    fn decrypt(&self, session: &SessionId, payload: &mut Vec<u8>, encryption: &EncryptionInfo) -> bool {
        let mut keys = self.lock();
        keys.decrypt_calls += 1;
        let session_matches = keys.sessions.get(&encryption.key_id) == Some(session);
        if !session_matches || keys.failing.contains(&encryption.key_id) {
            return false;
        }
        for byte in payload.iter_mut() {
            *byte ^= XOR_MASK;
        }
        true
    }

    fn ready_keys(&self) -> Vec<KeyId> {
        let mut keys: Vec<_> = self.lock().sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn add_observer(&self, id: Uuid, observer: Weak<dyn KeyReadyObserver>) {
        self.observers.add(id, observer);
    }

    fn remove_observer(&self, id: Uuid) {
        self.observers.remove(id);
    }

    fn set_video_resolution(&self, _session: &SessionId, width: u32, height: u32) {
        self.lock().resolution_hints.push((width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_round_trip_with_granted_key() {
        let drm = StaticDrmGate::new();
        let key = KeyId::from("key-1");
        let session = SessionId::new("session-1");
        drm.grant_key(key.clone(), session.clone());

        let mut payload = StaticDrmGate::encrypt(b"frame");
        let info = EncryptionInfo::new(key.clone(), vec![0; 8]);
        assert!(drm.decrypt(&session, &mut payload, &info));
        assert_eq!(payload, b"frame");
        assert_eq!(drm.ready_keys(), vec![key]);
    }

    #[test]
    fn test_unknown_or_failing_key_does_not_decrypt() {
        let drm = StaticDrmGate::new();
        let key = KeyId::from("key-1");
        let session = SessionId::new("session-1");
        let info = EncryptionInfo::new(key.clone(), vec![0; 8]);

        let mut payload = vec![1, 2, 3];
        assert!(!drm.decrypt(&session, &mut payload, &info));

        drm.grant_key(key.clone(), session.clone());
        drm.fail_decrypt(key);
        assert!(!drm.decrypt(&session, &mut payload, &info));
        assert_eq!(payload, vec![1, 2, 3]);
        assert_eq!(drm.decrypt_calls(), 2);
    }

    #[test]
    fn test_revoked_key_has_no_session() {
        let drm = StaticDrmGate::new();
        let key = KeyId::from("key-1");
        drm.grant_key(key.clone(), SessionId::new("s"));
        drm.revoke_key(&key);
        assert!(drm.session_for_key(&key).is_none());
        assert!(drm.ready_keys().is_empty());
    }
}
