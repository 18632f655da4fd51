//! Player configuration
//!
//! Every timing constant of the playback engine is tunable here. Values are
//! loaded from TOML (see [`playcore_common::config`] for file discovery) and
//! fall back to the built-in defaults when no file is present.
//!
//! ```toml
//! watchdog_interval_ms = 100
//! first_playback_buffer_ms = 500
//! steady_buffer_ms = 2000
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::{Error, Result};
use playcore_common::config::{load_toml_or_default, ConfigResolver, LoggingConfig};
use playcore_common::MediaTime;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Tunables for one player instance
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Buffer-health watchdog cadence
    pub watchdog_interval_ms: u64,

    /// Pushed-ahead margin below which the watchdog pauses playback
    pub min_buffer_ms: u64,

    /// Margin required to resume at the start of media or right after a seek
    pub first_playback_buffer_ms: u64,

    /// Margin required to resume during steady playback
    pub steady_buffer_ms: u64,

    /// Consecutive watchdog checks without video progress before readiness
    /// is forced
    pub stall_check_limit: u32,

    /// Upper bound a sample write waits for an in-flight key-ready replay
    pub oob_write_timeout_ms: u64,

    /// Delay between source creation and source configuration
    pub source_setup_delay_ms: u64,

    /// Pause before a flushing seek is issued
    pub seek_settle_delay_ms: u64,

    /// Video samples further than this ahead of the position do not trigger
    /// an immediate needs-data request
    pub video_lookahead_ms: u64,

    /// Delay before the deferred video needs-data request
    pub video_lookahead_retry_ms: u64,

    /// Seeks at or beyond this position start internally paused
    pub far_seek_threshold_ms: u64,

    /// Largest video frame width the decoder is configured for
    pub max_video_width: Option<u32>,

    /// Largest video frame height the decoder is configured for
    pub max_video_height: Option<u32>,

    /// Logging setup for the simulator binary
    pub logging: LoggingConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: 100,
            min_buffer_ms: 250,
            first_playback_buffer_ms: 500,
            steady_buffer_ms: 2_000,
            stall_check_limit: 8,
            oob_write_timeout_ms: 10_000,
            source_setup_delay_ms: 50,
            seek_settle_delay_ms: 50,
            video_lookahead_ms: 5_000,
            video_lookahead_retry_ms: 1_000,
            far_seek_threshold_ms: 10_000,
            max_video_width: None,
            max_video_height: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration using the standard resolution order
    ///
    /// `explicit` (usually a command-line argument) wins over the
    /// `PLAYCORE_CONFIG` environment variable, which wins over the platform
    /// config locations. The result is validated before it is returned.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let path = ConfigResolver::new().explicit(explicit).resolve();
        let config: PlayerConfig = load_toml_or_default(path.as_deref())?;
        config.validate()?;
        debug!(?config, "Player configuration loaded");
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.watchdog_interval_ms == 0 {
            return Err(Error::Config("watchdog_interval_ms must be greater than 0".into()));
        }
        if self.min_buffer_ms > self.first_playback_buffer_ms {
            return Err(Error::Config(format!(
                "min_buffer_ms ({}) must not exceed first_playback_buffer_ms ({})",
                self.min_buffer_ms, self.first_playback_buffer_ms
            )));
        }
        if self.first_playback_buffer_ms > self.steady_buffer_ms {
            return Err(Error::Config(format!(
                "first_playback_buffer_ms ({}) must not exceed steady_buffer_ms ({})",
                self.first_playback_buffer_ms, self.steady_buffer_ms
            )));
        }
        if self.video_lookahead_retry_ms == 0 {
            return Err(Error::Config("video_lookahead_retry_ms must be greater than 0".into()));
        }
        if matches!(self.max_video_width, Some(0)) || matches!(self.max_video_height, Some(0)) {
            return Err(Error::Config("maximum video resolution must be non-zero".into()));
        }
        Ok(())
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn oob_write_timeout(&self) -> Duration {
        Duration::from_millis(self.oob_write_timeout_ms)
    }

    pub fn source_setup_delay(&self) -> Duration {
        Duration::from_millis(self.source_setup_delay_ms)
    }

    pub fn seek_settle_delay(&self) -> Duration {
        Duration::from_millis(self.seek_settle_delay_ms)
    }

    pub fn video_lookahead(&self) -> MediaTime {
        MediaTime::from_millis(self.video_lookahead_ms as i64)
    }

    pub fn video_lookahead_retry(&self) -> Duration {
        Duration::from_millis(self.video_lookahead_retry_ms)
    }

    pub fn far_seek_threshold(&self) -> MediaTime {
        MediaTime::from_millis(self.far_seek_threshold_ms as i64)
    }

    /// Maximum video resolution when both dimensions are configured
    pub fn max_video_resolution(&self) -> Option<(u32, u32)> {
        self.max_video_width.zip(self.max_video_height)
    }
}
