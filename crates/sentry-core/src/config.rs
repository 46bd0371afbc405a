//! Engine configuration
//!
//! All knobs can be set from the environment (`SENTRY_*` variables, loaded
//! from `.env` by the binary) and fall back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the escalation policy and capture pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    /// How long an offending speaker stays muted before the automatic unmute.
    pub mute_duration: Duration,

    /// Cumulative per-speaker offense count that triggers a forced disconnect.
    pub kick_threshold: u64,

    /// Windowed room-wide count at which the celebration clip plays.
    pub celebration_threshold: u64,

    /// Period of the windowed-counter reset timer.
    pub window_period: Duration,

    /// Clip played over the channel whenever a speaker is muted.
    /// Empty string disables playback.
    pub warn_clip_url: String,

    /// Clip played when the room hits the celebration threshold.
    /// Empty string disables playback.
    pub celebration_clip_url: String,

    /// Upper bound on a single transcription call. Hitting it counts as
    /// "nothing recognized" for that segment.
    pub transcribe_timeout: Duration,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            mute_duration: Duration::from_secs(30),
            kick_threshold: 3,
            celebration_threshold: 5,
            window_period: Duration::from_secs(10),
            warn_clip_url: String::new(),
            celebration_clip_url: String::new(),
            transcribe_timeout: Duration::from_secs(10),
        }
    }
}

impl SentryConfig {
    /// Build from environment variables, falling back to defaults per field.
    ///
    /// Recognized variables: `SENTRY_MUTE_DURATION_SECS`,
    /// `SENTRY_COUNT_TO_KICK`, `SENTRY_BRASS_MONKEY_COUNT`,
    /// `SENTRY_WINDOW_RESET_SECS`, `SENTRY_ON_MUTE_URL`,
    /// `SENTRY_BRASS_MONKEY_URL`, `SENTRY_STT_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mute_duration: Duration::from_secs(
                env_u64("SENTRY_MUTE_DURATION_SECS", defaults.mute_duration.as_secs()).max(1),
            ),
            kick_threshold: env_u64("SENTRY_COUNT_TO_KICK", defaults.kick_threshold).max(1),
            celebration_threshold: env_u64(
                "SENTRY_BRASS_MONKEY_COUNT",
                defaults.celebration_threshold,
            )
            .max(1),
            window_period: Duration::from_secs(
                env_u64("SENTRY_WINDOW_RESET_SECS", defaults.window_period.as_secs()).max(1),
            ),
            warn_clip_url: std::env::var("SENTRY_ON_MUTE_URL").unwrap_or(defaults.warn_clip_url),
            celebration_clip_url: std::env::var("SENTRY_BRASS_MONKEY_URL")
                .unwrap_or(defaults.celebration_clip_url),
            transcribe_timeout: Duration::from_secs(
                env_u64(
                    "SENTRY_STT_TIMEOUT_SECS",
                    defaults.transcribe_timeout.as_secs(),
                )
                .max(1),
            ),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}
