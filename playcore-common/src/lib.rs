//! # Playcore Common Library
//!
//! Shared code for the playcore engine and its tools:
//! - Outbound event types (player state, decoder state, error kinds)
//! - Media timestamp arithmetic (`MediaTime`)
//! - Stream identity and per-stream storage
//! - Configuration file discovery
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod stream;
pub mod time;

pub use error::{Error, Result};
pub use stream::{PerStream, StreamFlags, StreamType};
pub use time::MediaTime;
