//! Escalation policy
//!
//! Turns one `MatchEvent` plus the current counters into moderation actions.
//! Stateless apart from the shared `TallyBoard`: receive event, bump, decide,
//! apply side effects through the outbound ports.
//!
//! Forbidden phrase: bump the speaker's cumulative count, mute them with the
//! warning clip (auto-unmute after the configured duration), announce the
//! offense, and kick them the first time the count reaches the threshold.
//! Celebration phrase: bump the windowed room count and play the celebration
//! clip on every match at or above the threshold (it re-fires within a
//! window, matching the original bot).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::actions::{ClipPlayer, Notifier, VoiceControl};
use crate::config::SentryConfig;
use crate::error::SentryError;
use crate::phrase::{MatchEvent, PhraseKind, SpeakerId};
use crate::tally::TallyBoard;

pub struct Enforcer {
    config: SentryConfig,
    tally: Arc<TallyBoard>,
    voice: Arc<dyn VoiceControl>,
    player: Arc<dyn ClipPlayer>,
    notifier: Arc<dyn Notifier>,
}

impl Enforcer {
    pub fn new(
        config: SentryConfig,
        tally: Arc<TallyBoard>,
        voice: Arc<dyn VoiceControl>,
        player: Arc<dyn ClipPlayer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            tally,
            voice,
            player,
            notifier,
        }
    }

    pub fn tally(&self) -> &Arc<TallyBoard> {
        &self.tally
    }

    pub async fn handle_match(&self, event: &MatchEvent) {
        debug!(speaker = %event.speaker.id, phrase = %event.phrase, literal = %event.literal, "phrase heard");
        match event.kind {
            PhraseKind::Forbidden => self.handle_forbidden(event).await,
            PhraseKind::Celebration => self.handle_celebration(event).await,
        }
    }

    async fn handle_forbidden(&self, event: &MatchEvent) {
        let count = self.tally.bump_speaker(&event.phrase, event.speaker.id);

        self.mute_with_warning(event.speaker.id).await;

        self.say(&format!(
            "{} is a bad word {}",
            event.literal, event.speaker.display_name
        ))
        .await;

        // Kick exactly once, on the match where the count first reaches the
        // threshold.
        if count == self.config.kick_threshold {
            info!(speaker = %event.speaker.id, count, "kick threshold reached");
            match self.voice.kick(event.speaker.id).await {
                Ok(()) => {
                    self.say(&format!("bye bye {}", event.speaker.display_name))
                        .await;
                }
                Err(SentryError::SpeakerGone) => {
                    debug!(speaker = %event.speaker.id, "speaker already left, kick skipped");
                }
                Err(e) => warn!(speaker = %event.speaker.id, error = %e, "kick failed"),
            }
        }
    }

    async fn handle_celebration(&self, event: &MatchEvent) {
        let count = self.tally.bump_window(&event.phrase);
        debug!(phrase = %event.phrase, count, "celebration count");
        if count >= self.config.celebration_threshold {
            info!(phrase = %event.phrase, count, "🎉 celebration threshold hit");
            self.play_clip(&self.config.celebration_clip_url).await;
        }
    }

    /// Mute, play the warning clip, and schedule the automatic unmute. A
    /// speaker who already left is skipped silently.
    async fn mute_with_warning(&self, speaker: SpeakerId) {
        match self.voice.set_mute(speaker, true).await {
            Ok(()) => {
                self.play_clip(&self.config.warn_clip_url).await;

                let voice = Arc::clone(&self.voice);
                let wait = self.config.mute_duration;
                tokio::spawn(async move {
                    tokio::time::sleep(wait).await;
                    match voice.set_mute(speaker, false).await {
                        Ok(()) => debug!(%speaker, "unmuted"),
                        Err(SentryError::SpeakerGone) => {}
                        Err(e) => warn!(%speaker, error = %e, "unmute failed"),
                    }
                });
            }
            Err(SentryError::SpeakerGone) => {
                debug!(%speaker, "speaker already left, mute skipped");
            }
            Err(e) => warn!(%speaker, error = %e, "mute failed"),
        }
    }

    async fn play_clip(&self, url: &str) {
        if url.is_empty() {
            return;
        }
        if let Err(e) = self.player.play(url).await {
            warn!(url, error = %e, "clip playback failed");
        }
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.notifier.announce(text).await {
            warn!(error = %e, "notification failed");
        }
    }
}
