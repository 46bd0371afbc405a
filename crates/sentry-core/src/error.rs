//! Error types for the sentry engine

use thiserror::Error;

/// Result type alias for sentry operations
pub type SentryResult<T> = Result<T, SentryError>;

/// Errors that can occur while monitoring a voice channel
#[derive(Error, Debug)]
pub enum SentryError {
    #[error("a watch session is already active")]
    SessionAlreadyActive,

    #[error("no watch session is active")]
    SessionNotActive,

    #[error("join a voice channel first")]
    NoVoiceChannel,

    /// The speaker left the channel between speaking and the action applying.
    /// Expected race; callers skip the action silently.
    #[error("speaker is no longer in the voice channel")]
    SpeakerGone,

    #[error("voice platform error: {0}")]
    Platform(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("configuration error: {0}")]
    Config(String),
}
