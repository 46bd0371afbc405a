//! **Speech-to-Text**: convert a captured `AudioSegment` into text for the
//! phrase matcher.
//!
//! Implement `Transcriber` for a remote recognizer (Google Cloud Speech in
//! the bot binary) or use `ScriptedTranscriber` to drive the engine in tests
//! without any audio at all.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SentryResult;

/// One speaker's buffered utterance, ready for recognition. The voice
/// platform hands us decoded PCM; these parameters describe it to the
/// recognizer.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Interleaved signed 16-bit little-endian PCM.
    pub pcm: Vec<u8>,
    pub sample_rate_hz: u32,
    pub channels: u32,
    /// BCP-47 language tag, e.g. "en-US".
    pub locale: String,
}

impl AudioSegment {
    /// Segment parameters for audio decoded from a Discord voice connection:
    /// 48 kHz interleaved stereo.
    pub fn from_discord_pcm(samples: &[i16]) -> Self {
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            pcm.extend_from_slice(&s.to_le_bytes());
        }
        Self {
            pcm,
            sample_rate_hz: 48_000,
            channels: 2,
            locale: "en-US".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}

/// Backend that recognizes speech in one segment. Return an empty string
/// when nothing was recognized; that is not an error.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment: &AudioSegment) -> SentryResult<String>;
}

/// Scripted transcriber for tests and demos: pops one canned line per call,
/// then returns empty strings. Build with `always` to repeat a single line.
#[derive(Debug, Default)]
pub struct ScriptedTranscriber {
    lines: Mutex<VecDeque<String>>,
    repeat: Option<String>,
}

impl ScriptedTranscriber {
    pub fn sequence<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Mutex::new(lines.into_iter().map(Into::into).collect()),
            repeat: None,
        }
    }

    pub fn always(line: impl Into<String>) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            repeat: Some(line.into()),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _segment: &AudioSegment) -> SentryResult<String> {
        if let Some(line) = self.lines.lock().expect("scripted lines lock").pop_front() {
            return Ok(line);
        }
        Ok(self.repeat.clone().unwrap_or_default())
    }
}
