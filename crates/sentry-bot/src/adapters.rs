//! Discord implementations of the engine's outbound ports
//!
//! `DiscordVoice` owns the songbird call for the active session and performs
//! moderation through the guild member API. `ChannelNotifier` posts to the
//! text channel the session was started from; with no target set it drops
//! messages, which is how notifications behave before a session announces
//! itself.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Cache, ChannelId, EditMember, GuildId, Http, UserId};
use songbird::input::YoutubeDl;
use songbird::{CoreEvent, Songbird};
use tokio::sync::RwLock;
use tracing::{debug, info};

use sentry_core::{
    ClipPlayer, Notifier, SentryError, SentryResult, SessionController, SpeakerId, VoiceControl,
    VoiceLink, VoiceTarget,
};

use crate::receiver::VoiceSentryReceiver;

struct ActiveCall {
    guild: GuildId,
    call: Arc<tokio::sync::Mutex<songbird::Call>>,
}

pub struct DiscordVoice {
    http: Arc<Http>,
    cache: Arc<Cache>,
    songbird: Arc<Songbird>,
    http_client: reqwest::Client,
    controller: RwLock<Option<SessionController>>,
    active: RwLock<Option<ActiveCall>>,
}

impl DiscordVoice {
    pub fn new(
        http: Arc<Http>,
        cache: Arc<Cache>,
        songbird: Arc<Songbird>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            http,
            cache,
            songbird,
            http_client,
            controller: RwLock::new(None),
            active: RwLock::new(None),
        }
    }

    /// Wire in the session controller after construction. The controller
    /// holds this adapter as its link, so the two are built in sequence.
    pub async fn bind_controller(&self, controller: SessionController) {
        *self.controller.write().await = Some(controller);
    }

    async fn active_guild(&self) -> Option<GuildId> {
        self.active.read().await.as_ref().map(|a| a.guild)
    }

    /// Member-edit failures for speakers who already left are the expected
    /// race; everything else is a platform error.
    fn classify_member_error(e: serenity::Error) -> SentryError {
        let msg = e.to_string();
        if msg.contains("Unknown Member")
            || msg.contains("Unknown User")
            || msg.contains("not connected to voice")
        {
            SentryError::SpeakerGone
        } else {
            SentryError::Platform(msg)
        }
    }
}

#[async_trait]
impl VoiceLink for DiscordVoice {
    async fn connect(&self, target: VoiceTarget) -> SentryResult<()> {
        let controller = self
            .controller
            .read()
            .await
            .clone()
            .ok_or_else(|| SentryError::Platform("controller not bound".to_string()))?;

        let guild = GuildId::new(target.guild_id);
        let channel = ChannelId::new(target.channel_id);
        let call = self
            .songbird
            .join(guild, channel)
            .await
            .map_err(|e| SentryError::Platform(format!("failed to join voice channel: {e}")))?;

        {
            let mut handler = call.lock().await;
            let receiver = VoiceSentryReceiver::new(controller, Arc::clone(&self.cache), guild);
            handler.add_global_event(CoreEvent::SpeakingStateUpdate.into(), receiver.clone());
            handler.add_global_event(CoreEvent::VoiceTick.into(), receiver);
        }
        info!(%guild, %channel, "joined voice channel");

        *self.active.write().await = Some(ActiveCall { guild, call });
        Ok(())
    }

    async fn disconnect(&self) -> SentryResult<()> {
        let Some(active) = self.active.write().await.take() else {
            return Ok(());
        };
        self.songbird
            .remove(active.guild)
            .await
            .map_err(|e| SentryError::Platform(format!("failed to leave voice channel: {e}")))?;
        info!(guild = %active.guild, "left voice channel");
        Ok(())
    }
}

#[async_trait]
impl VoiceControl for DiscordVoice {
    async fn set_mute(&self, speaker: SpeakerId, muted: bool) -> SentryResult<()> {
        let Some(guild) = self.active_guild().await else {
            return Err(SentryError::SpeakerGone);
        };
        guild
            .edit_member(
                &self.http,
                UserId::new(speaker.0),
                EditMember::new().mute(muted),
            )
            .await
            .map(|_| ())
            .map_err(Self::classify_member_error)
    }

    async fn kick(&self, speaker: SpeakerId) -> SentryResult<()> {
        let Some(guild) = self.active_guild().await else {
            return Err(SentryError::SpeakerGone);
        };
        guild
            .edit_member(
                &self.http,
                UserId::new(speaker.0),
                EditMember::new().disconnect_member(),
            )
            .await
            .map(|_| ())
            .map_err(Self::classify_member_error)
    }
}

#[async_trait]
impl ClipPlayer for DiscordVoice {
    async fn play(&self, url: &str) -> SentryResult<()> {
        let active = self.active.read().await;
        let Some(active) = active.as_ref() else {
            return Err(SentryError::Playback("no active voice connection".to_string()));
        };
        debug!(url, "playing clip");
        let source = YoutubeDl::new(self.http_client.clone(), url.to_string());
        let mut call = active.call.lock().await;
        let _ = call.play_input(source.into());
        Ok(())
    }
}

pub struct ChannelNotifier {
    http: Arc<Http>,
    target: RwLock<Option<ChannelId>>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            target: RwLock::new(None),
        }
    }

    pub async fn set_target(&self, channel: ChannelId) {
        *self.target.write().await = Some(channel);
    }

    pub async fn clear(&self) {
        *self.target.write().await = None;
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn announce(&self, text: &str) -> SentryResult<()> {
        let target = *self.target.read().await;
        // No announcement target configured: drop silently
        let Some(channel) = target else {
            return Ok(());
        };
        channel
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| SentryError::Notify(e.to_string()))
    }
}
