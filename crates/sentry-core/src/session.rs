//! Session controller
//!
//! Owns the lifecycle of the single active watch session: Idle or Active
//! with one voice connection, one notification target, and the live
//! per-speaker captures. Speaking events fan out into capture buffers; each
//! completed buffer is transcribed and matched on its own task, so captures
//! for different speakers finish in any order.
//!
//! Every session gets an epoch. A capture task carries the epoch it was
//! opened under and its result is dropped on arrival when the session has
//! since ended, so late transcriptions never touch the counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::actions::{NotifyTarget, VoiceLink, VoiceTarget};
use crate::config::SentryConfig;
use crate::enforcer::Enforcer;
use crate::error::{SentryError, SentryResult};
use crate::phrase::{MatchEvent, PhraseCatalog, Speaker, SpeakerId};
use crate::stt::{AudioSegment, Transcriber};

/// One speaker's open capture. Buffering until the platform reports the
/// speaker stopped; Transcribing while the recognizer call is in flight.
/// At most one capture per speaker either way.
struct Capture {
    speaker: Speaker,
    stage: CaptureStage,
}

enum CaptureStage {
    Buffering(Vec<i16>),
    Transcribing,
}

enum SessionState {
    Idle,
    Active {
        epoch: u64,
        voice: VoiceTarget,
        notify: Option<NotifyTarget>,
        captures: HashMap<SpeakerId, Capture>,
    },
}

/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    catalog: PhraseCatalog,
    transcriber: Arc<dyn Transcriber>,
    enforcer: Arc<Enforcer>,
    link: Arc<dyn VoiceLink>,
    transcribe_timeout: Duration,
    state: Mutex<SessionState>,
    next_epoch: AtomicU64,
}

impl SessionController {
    pub fn new(
        config: &SentryConfig,
        catalog: PhraseCatalog,
        transcriber: Arc<dyn Transcriber>,
        enforcer: Arc<Enforcer>,
        link: Arc<dyn VoiceLink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                transcriber,
                enforcer,
                link,
                transcribe_timeout: config.transcribe_timeout,
                state: Mutex::new(SessionState::Idle),
                next_epoch: AtomicU64::new(1),
            }),
        }
    }

    /// Begin watching a voice channel. Rejected while a session is active or
    /// when the channel cannot be joined; no state changes on rejection.
    pub async fn start(
        &self,
        voice: VoiceTarget,
        notify: Option<NotifyTarget>,
    ) -> SentryResult<()> {
        let mut state = self.inner.state.lock().await;
        if matches!(*state, SessionState::Active { .. }) {
            return Err(SentryError::SessionAlreadyActive);
        }
        self.inner.link.connect(voice).await?;
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        *state = SessionState::Active {
            epoch,
            voice,
            notify,
            captures: HashMap::new(),
        };
        info!(guild = voice.guild_id, channel = voice.channel_id, "🛡️ sentry session started");
        Ok(())
    }

    /// End the active session. Live captures are discarded without waiting;
    /// their transcription results are dropped on arrival.
    pub async fn end(&self) -> SentryResult<()> {
        let mut state = self.inner.state.lock().await;
        if matches!(*state, SessionState::Idle) {
            return Err(SentryError::SessionNotActive);
        }
        if let Err(e) = self.inner.link.disconnect().await {
            warn!(error = %e, "voice disconnect failed");
        }
        *state = SessionState::Idle;
        info!("sentry session ended");
        Ok(())
    }

    pub async fn is_active(&self) -> bool {
        matches!(*self.inner.state.lock().await, SessionState::Active { .. })
    }

    /// The watched voice channel and notification target, when active.
    pub async fn status(&self) -> Option<(VoiceTarget, Option<NotifyTarget>)> {
        match *self.inner.state.lock().await {
            SessionState::Active { voice, notify, .. } => Some((voice, notify)),
            SessionState::Idle => None,
        }
    }

    /// Number of live captures (buffering or transcribing).
    pub async fn capture_count(&self) -> usize {
        match &*self.inner.state.lock().await {
            SessionState::Active { captures, .. } => captures.len(),
            SessionState::Idle => 0,
        }
    }

    /// Whether `speaker` has a live capture.
    pub async fn has_capture(&self, speaker: SpeakerId) -> bool {
        match &*self.inner.state.lock().await {
            SessionState::Active { captures, .. } => captures.contains_key(&speaker),
            SessionState::Idle => false,
        }
    }

    /// The platform reported `speaker` began speaking. Bots are never
    /// captured, and a speaker with an open capture is not re-captured.
    pub async fn speaking_started(&self, speaker: Speaker) {
        if speaker.is_bot {
            return;
        }
        let mut state = self.inner.state.lock().await;
        if let SessionState::Active { captures, .. } = &mut *state {
            if captures.contains_key(&speaker.id) {
                return;
            }
            debug!(speaker = %speaker.id, "🎙️ capture opened");
            captures.insert(
                speaker.id,
                Capture {
                    speaker,
                    stage: CaptureStage::Buffering(Vec::new()),
                },
            );
        }
    }

    /// Decoded PCM for a speaker with an open capture. Audio for unknown
    /// speakers (or arriving while their transcription is in flight) is
    /// discarded.
    pub async fn push_audio(&self, speaker: SpeakerId, samples: &[i16]) {
        let mut state = self.inner.state.lock().await;
        if let SessionState::Active { captures, .. } = &mut *state {
            if let Some(capture) = captures.get_mut(&speaker) {
                if let CaptureStage::Buffering(buf) = &mut capture.stage {
                    buf.extend_from_slice(samples);
                }
            }
        }
    }

    /// The platform reported `speaker` stopped. Closes the buffer and hands
    /// it to the recognizer on its own task.
    pub async fn speaking_stopped(&self, speaker: SpeakerId) {
        let (epoch, speaker, samples) = {
            let mut state = self.inner.state.lock().await;
            let SessionState::Active { epoch, captures, .. } = &mut *state else {
                return;
            };
            let Some(capture) = captures.get_mut(&speaker) else {
                return;
            };
            let CaptureStage::Buffering(buf) = &mut capture.stage else {
                return;
            };
            let samples = std::mem::take(buf);
            capture.stage = CaptureStage::Transcribing;
            (*epoch, capture.speaker.clone(), samples)
        };

        let this = self.clone();
        tokio::spawn(async move {
            this.dispatch(epoch, speaker, samples).await;
        });
    }

    /// Transcribe one closed buffer, then match and enforce, unless the
    /// session the capture belongs to has ended.
    async fn dispatch(&self, epoch: u64, speaker: Speaker, samples: Vec<i16>) {
        let transcript = self.recognize(&speaker, samples).await;
        let hits = transcript
            .as_deref()
            .map(|t| self.inner.catalog.scan(t))
            .unwrap_or_default();

        let live = {
            let mut state = self.inner.state.lock().await;
            match &mut *state {
                SessionState::Active {
                    epoch: current,
                    captures,
                    ..
                } if *current == epoch => {
                    captures.remove(&speaker.id);
                    true
                }
                _ => false,
            }
        };
        if !live {
            debug!(speaker = %speaker.id, "session ended before transcript arrived, result dropped");
            return;
        }

        for hit in hits {
            self.inner
                .enforcer
                .handle_match(&MatchEvent::new(speaker.clone(), hit))
                .await;
        }
    }

    /// Bounded transcription of one segment. Empty buffers, recognizer
    /// errors and timeouts all degrade to "nothing recognized".
    async fn recognize(&self, speaker: &Speaker, samples: Vec<i16>) -> Option<String> {
        if samples.is_empty() {
            return None;
        }
        let segment = AudioSegment::from_discord_pcm(&samples);
        let call = self.inner.transcriber.transcribe(&segment);
        match tokio::time::timeout(self.inner.transcribe_timeout, call).await {
            Ok(Ok(text)) => {
                let text = text.trim().to_lowercase();
                if text.is_empty() {
                    None
                } else {
                    debug!(speaker = %speaker.id, transcript = %text, "transcribed");
                    Some(text)
                }
            }
            Ok(Err(e)) => {
                debug!(speaker = %speaker.id, error = %e, "transcription failed, no match");
                None
            }
            Err(_) => {
                debug!(speaker = %speaker.id, "transcription timed out, no match");
                None
            }
        }
    }
}
