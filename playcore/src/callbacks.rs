//! Outbound notifications to the media engine
//!
//! Callbacks are always invoked on the player's control thread, in the order
//! the triggering events happened.

use playcore_common::events::{DecoderState, PlayerErrorKind, PlayerEvent, PlayerState};
use playcore_common::StreamType;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// Receiver of player notifications
pub trait PlayerCallbacks: Send + Sync {
    fn on_player_state(&self, player: Uuid, state: PlayerState, ticket: i32);

    fn on_decoder_status(&self, player: Uuid, stream: StreamType, state: DecoderState, ticket: i32);

    fn on_error(&self, player: Uuid, kind: PlayerErrorKind, message: &str);
}

/// Callbacks forwarding every notification as a [`PlayerEvent`] record
///
/// Used by the simulator's JSON event log and by tests.
pub struct ChannelCallbacks {
    tx: Sender<PlayerEvent>,
}

impl ChannelCallbacks {
    pub fn new() -> (Arc<Self>, Receiver<PlayerEvent>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, event: PlayerEvent) {
        trace!(event = event.event_type(), "Forwarding player event");
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl PlayerCallbacks for ChannelCallbacks {
    fn on_player_state(&self, player: Uuid, state: PlayerState, ticket: i32) {
        self.send(PlayerEvent::player_state(player, state, ticket));
    }

    fn on_decoder_status(&self, player: Uuid, stream: StreamType, state: DecoderState, ticket: i32) {
        self.send(PlayerEvent::decoder_status(player, stream, state, ticket));
    }

    fn on_error(&self, player: Uuid, kind: PlayerErrorKind, message: &str) {
        self.send(PlayerEvent::error(player, kind, message));
    }
}
