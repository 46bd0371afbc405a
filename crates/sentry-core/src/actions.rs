//! Outbound ports to the voice platform
//!
//! The engine never talks to Discord directly; it drives these traits. The
//! bot binary implements them over serenity/songbird, and `ActionRecorder`
//! implements all of them in memory so the whole pipeline can run in tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{SentryError, SentryResult};
use crate::phrase::SpeakerId;

/// Platform address of a voice channel (server + channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceTarget {
    pub guild_id: u64,
    pub channel_id: u64,
}

/// Platform address of the text channel that receives notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyTarget(pub u64);

/// Lifecycle of the single voice connection a session owns.
#[async_trait]
pub trait VoiceLink: Send + Sync {
    /// Join the voice channel and start delivering speaking events.
    /// `SentryError::NoVoiceChannel` when the target is unavailable.
    async fn connect(&self, target: VoiceTarget) -> SentryResult<()>;

    /// Leave the current voice channel. Best-effort; errors are logged by
    /// the caller, not propagated to the command surface.
    async fn disconnect(&self) -> SentryResult<()>;
}

/// Per-speaker moderation. Both operations report `SpeakerGone` when the
/// member already left; callers treat that as a skip, not a failure.
#[async_trait]
pub trait VoiceControl: Send + Sync {
    async fn set_mute(&self, speaker: SpeakerId, muted: bool) -> SentryResult<()>;
    async fn kick(&self, speaker: SpeakerId) -> SentryResult<()>;
}

/// Streams a clip from a media URL into the active voice connection.
#[async_trait]
pub trait ClipPlayer: Send + Sync {
    async fn play(&self, url: &str) -> SentryResult<()>;
}

/// Posts a message to the session's notification channel. Implementations
/// with no target configured drop messages silently.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn announce(&self, text: &str) -> SentryResult<()>;
}

/// Everything the engine did, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Connected(VoiceTarget),
    Disconnected,
    Muted(SpeakerId),
    Unmuted(SpeakerId),
    Kicked(SpeakerId),
    Played(String),
    Announced(String),
}

/// In-memory implementation of every outbound port. Speakers marked gone
/// make moderation calls fail with `SpeakerGone`, reproducing the
/// left-before-action race.
#[derive(Debug, Default)]
pub struct ActionRecorder {
    actions: Mutex<Vec<RecordedAction>>,
    gone: Mutex<HashSet<SpeakerId>>,
}

impl ActionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subsequent mute/kick calls for this speaker fail with `SpeakerGone`.
    pub fn mark_gone(&self, speaker: SpeakerId) {
        self.gone.lock().expect("gone lock").insert(speaker);
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions.lock().expect("actions lock").clone()
    }

    /// Count of recorded actions matching the predicate.
    pub fn count(&self, pred: impl Fn(&RecordedAction) -> bool) -> usize {
        self.actions
            .lock()
            .expect("actions lock")
            .iter()
            .filter(|a| pred(a))
            .count()
    }

    fn record(&self, action: RecordedAction) {
        self.actions.lock().expect("actions lock").push(action);
    }

    fn check_present(&self, speaker: SpeakerId) -> SentryResult<()> {
        if self.gone.lock().expect("gone lock").contains(&speaker) {
            Err(SentryError::SpeakerGone)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VoiceLink for ActionRecorder {
    async fn connect(&self, target: VoiceTarget) -> SentryResult<()> {
        self.record(RecordedAction::Connected(target));
        Ok(())
    }

    async fn disconnect(&self) -> SentryResult<()> {
        self.record(RecordedAction::Disconnected);
        Ok(())
    }
}

#[async_trait]
impl VoiceControl for ActionRecorder {
    async fn set_mute(&self, speaker: SpeakerId, muted: bool) -> SentryResult<()> {
        self.check_present(speaker)?;
        self.record(if muted {
            RecordedAction::Muted(speaker)
        } else {
            RecordedAction::Unmuted(speaker)
        });
        Ok(())
    }

    async fn kick(&self, speaker: SpeakerId) -> SentryResult<()> {
        self.check_present(speaker)?;
        self.record(RecordedAction::Kicked(speaker));
        Ok(())
    }
}

#[async_trait]
impl ClipPlayer for ActionRecorder {
    async fn play(&self, url: &str) -> SentryResult<()> {
        self.record(RecordedAction::Played(url.to_string()));
        Ok(())
    }
}

#[async_trait]
impl Notifier for ActionRecorder {
    async fn announce(&self, text: &str) -> SentryResult<()> {
        self.record(RecordedAction::Announced(text.to_string()));
        Ok(())
    }
}
