//! Songbird voice receiver
//!
//! Bridges Discord's voice events into the session controller: maps SSRC to
//! user, turns speaking-state transitions into capture open/close, and feeds
//! decoded 48 kHz stereo PCM into the open captures. Discord clients do not
//! always send a clean stopped-speaking update, so a silence timeout closes
//! captures that went quiet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serenity::all::{Cache, GuildId, UserId};
use songbird::events::{Event, EventContext, EventHandler as VoiceEventHandler};
use tokio::sync::Mutex;
use tracing::debug;

use sentry_core::{SessionController, Speaker, SpeakerId};

/// A speaker whose packets stop for this long is treated as done talking
/// even without a speaking-state update.
const SILENCE_TIMEOUT: Duration = Duration::from_millis(1500);

struct TrackedSsrc {
    user: Option<u64>,
    speaking: bool,
    last_packet: Instant,
}

impl TrackedSsrc {
    fn new() -> Self {
        Self {
            user: None,
            speaking: false,
            last_packet: Instant::now(),
        }
    }
}

enum CaptureSignal {
    Started(u64),
    Stopped(u64),
    Audio(u64, Vec<i16>),
}

#[derive(Clone)]
pub struct VoiceSentryReceiver {
    inner: Arc<ReceiverInner>,
}

struct ReceiverInner {
    controller: SessionController,
    cache: Arc<Cache>,
    guild: GuildId,
    tracked: Mutex<HashMap<u32, TrackedSsrc>>,
}

impl VoiceSentryReceiver {
    pub fn new(controller: SessionController, cache: Arc<Cache>, guild: GuildId) -> Self {
        Self {
            inner: Arc::new(ReceiverInner {
                controller,
                cache,
                guild,
                tracked: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Best-effort speaker lookup from the cache. Members outside the cache
    /// fall back to their raw id as a display name; the bot flag then
    /// defaults to false, matching what the platform reports for humans.
    fn resolve_speaker(&self, user_id: u64) -> Speaker {
        let uid = UserId::new(user_id);
        if let Some(guild) = self.inner.cache.guild(self.inner.guild) {
            if let Some(member) = guild.members.get(&uid) {
                return Speaker {
                    id: SpeakerId(user_id),
                    display_name: member.display_name().to_string(),
                    is_bot: member.user.bot,
                };
            }
        }
        if let Some(user) = self.inner.cache.user(uid) {
            return Speaker {
                id: SpeakerId(user_id),
                display_name: user.name.clone(),
                is_bot: user.bot,
            };
        }
        Speaker {
            id: SpeakerId(user_id),
            display_name: user_id.to_string(),
            is_bot: false,
        }
    }

    async fn apply(&self, signals: Vec<CaptureSignal>) {
        for signal in signals {
            match signal {
                CaptureSignal::Started(user_id) => {
                    let speaker = self.resolve_speaker(user_id);
                    debug!(user = user_id, name = %speaker.display_name, "started speaking");
                    self.inner.controller.speaking_started(speaker).await;
                }
                CaptureSignal::Stopped(user_id) => {
                    debug!(user = user_id, "stopped speaking");
                    self.inner
                        .controller
                        .speaking_stopped(SpeakerId(user_id))
                        .await;
                }
                CaptureSignal::Audio(user_id, samples) => {
                    self.inner
                        .controller
                        .push_audio(SpeakerId(user_id), &samples)
                        .await;
                }
            }
        }
    }
}

#[async_trait]
impl VoiceEventHandler for VoiceSentryReceiver {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match ctx {
            EventContext::SpeakingStateUpdate(speaking) => {
                let is_speaking = speaking.speaking.bits() > 0;
                let signals = {
                    let mut tracked = self.inner.tracked.lock().await;
                    let entry = tracked
                        .entry(speaking.ssrc)
                        .or_insert_with(TrackedSsrc::new);
                    if let Some(user_id) = speaking.user_id {
                        entry.user = Some(user_id.0);
                    }
                    let mut signals = Vec::new();
                    if let Some(user) = entry.user {
                        if is_speaking && !entry.speaking {
                            entry.speaking = true;
                            entry.last_packet = Instant::now();
                            signals.push(CaptureSignal::Started(user));
                        } else if !is_speaking && entry.speaking {
                            entry.speaking = false;
                            signals.push(CaptureSignal::Stopped(user));
                        }
                    }
                    signals
                };
                self.apply(signals).await;
            }
            EventContext::VoiceTick(tick) => {
                let signals = {
                    let mut tracked = self.inner.tracked.lock().await;
                    let mut signals = Vec::new();

                    for (ssrc, data) in &tick.speaking {
                        let Some(decoded) = data.decoded_voice.as_ref() else {
                            continue;
                        };
                        let entry = tracked.entry(*ssrc).or_insert_with(TrackedSsrc::new);
                        let Some(user) = entry.user else {
                            // Packets before the first speaking-state update
                            // cannot be attributed; skip them
                            continue;
                        };
                        if !entry.speaking {
                            entry.speaking = true;
                            signals.push(CaptureSignal::Started(user));
                        }
                        entry.last_packet = Instant::now();
                        signals.push(CaptureSignal::Audio(user, decoded.clone()));
                    }

                    // Close captures that went quiet without a stop update
                    for entry in tracked.values_mut() {
                        if entry.speaking && entry.last_packet.elapsed() > SILENCE_TIMEOUT {
                            entry.speaking = false;
                            if let Some(user) = entry.user {
                                signals.push(CaptureSignal::Stopped(user));
                            }
                        }
                    }
                    signals
                };
                self.apply(signals).await;
            }
            _ => {}
        }
        None
    }
}
