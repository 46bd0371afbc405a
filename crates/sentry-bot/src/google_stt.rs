//! Google Cloud Speech transcription adapter
//!
//! One `speech:recognize` call per captured segment: LINEAR16 content,
//! base64 in the JSON body, top alternative per result joined with newlines.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use sentry_core::{AudioSegment, SentryError, SentryResult, Transcriber};

const DEFAULT_ENDPOINT: &str = "https://speech.googleapis.com";

#[derive(Debug, Clone)]
pub struct GoogleTranscriber {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl GoogleTranscriber {
    /// Build from environment: `SENTRY_SPEECH_API_KEY` (or
    /// `GOOGLE_SPEECH_API_KEY`), optional `SENTRY_SPEECH_ENDPOINT`.
    pub fn from_env() -> SentryResult<Self> {
        let api_key = std::env::var("SENTRY_SPEECH_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_SPEECH_API_KEY"))
            .map_err(|_| {
                SentryError::Config(
                    "speech recognition requires SENTRY_SPEECH_API_KEY or GOOGLE_SPEECH_API_KEY"
                        .to_string(),
                )
            })?;
        let endpoint = std::env::var("SENTRY_SPEECH_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(endpoint, api_key)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> SentryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SentryError::Transcription(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizeAlternative {
    #[serde(default)]
    transcript: String,
}

fn top_transcripts(response: &RecognizeResponse) -> String {
    response
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Transcriber for GoogleTranscriber {
    async fn transcribe(&self, segment: &AudioSegment) -> SentryResult<String> {
        if segment.is_empty() {
            return Ok(String::new());
        }
        let url = format!(
            "{}/v1/speech:recognize?key={}",
            self.endpoint.trim_end_matches('/'),
            self.api_key
        );
        let body = json!({
            "config": {
                "encoding": "LINEAR16",
                "sampleRateHertz": segment.sample_rate_hz,
                "languageCode": segment.locale,
                "audioChannelCount": segment.channels,
            },
            "audio": {
                "content": BASE64.encode(&segment.pcm),
            },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SentryError::Transcription(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SentryError::Transcription(format!(
                "speech API error {status}: {body}"
            )));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| SentryError::Transcription(e.to_string()))?;
        let text = top_transcripts(&parsed);
        debug!(chars = text.len(), "recognized segment");
        Ok(text)
    }
}
