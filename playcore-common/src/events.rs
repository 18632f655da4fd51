//! Event types for the playcore event system
//!
//! The engine reports to its host through three outbound channels: player
//! state changes, decoder status changes and errors. The enums below are the
//! vocabulary of those channels; [`PlayerEvent`] is the serializable record
//! form used for event logs.

use crate::stream::StreamType;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ticket value used before the first seek assigns one
pub const INITIAL_TICKET: i32 = 0;

/// Player lifecycle as reported to the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Control thread is running, pipeline created
    Initialized,
    /// Buffering towards presentation (initial or after seek)
    Prerolling,
    /// Preroll complete, media is being presented
    Presenting,
    /// Pipeline reached end of stream
    EndOfStream,
    /// Player torn down; last state ever reported
    Destroyed,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Initialized => write!(f, "Initialized"),
            PlayerState::Prerolling => write!(f, "Prerolling"),
            PlayerState::Presenting => write!(f, "Presenting"),
            PlayerState::EndOfStream => write!(f, "EndOfStream"),
            PlayerState::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Decoder status reported per stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderState {
    /// The decoder wants another sample for the stream
    NeedsData,
}

impl fmt::Display for DecoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderState::NeedsData => write!(f, "NeedsData"),
        }
    }
}

/// Error kinds surfaced through the error callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerErrorKind {
    /// Decrypt failure or pipeline stream error
    Decode,
}

impl fmt::Display for PlayerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerErrorKind::Decode => write!(f, "DecodeError"),
        }
    }
}

/// Serializable record of one outbound notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Player state changed
    PlayerStateChanged {
        player_id: Uuid,
        state: PlayerState,
        ticket: i32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Decoder status for one stream
    DecoderStatus {
        player_id: Uuid,
        stream: StreamType,
        state: DecoderState,
        ticket: i32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Error reported to the media engine
    Error {
        player_id: Uuid,
        kind: PlayerErrorKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    pub fn player_state(player_id: Uuid, state: PlayerState, ticket: i32) -> Self {
        PlayerEvent::PlayerStateChanged {
            player_id,
            state,
            ticket,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn decoder_status(player_id: Uuid, stream: StreamType, state: DecoderState, ticket: i32) -> Self {
        PlayerEvent::DecoderStatus {
            player_id,
            stream,
            state,
            ticket,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(player_id: Uuid, kind: PlayerErrorKind, message: impl Into<String>) -> Self {
        PlayerEvent::Error {
            player_id,
            kind,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Player that emitted the event
    pub fn player_id(&self) -> Uuid {
        match self {
            PlayerEvent::PlayerStateChanged { player_id, .. }
            | PlayerEvent::DecoderStatus { player_id, .. }
            | PlayerEvent::Error { player_id, .. } => *player_id,
        }
    }

    /// Event type name (for logging)
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlayerStateChanged { .. } => "PlayerStateChanged",
            PlayerEvent::DecoderStatus { .. } => "DecoderStatus",
            PlayerEvent::Error { .. } => "Error",
        }
    }
}
