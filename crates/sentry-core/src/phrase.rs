//! Trigger phrases and the transcript matcher
//!
//! A `PhraseCatalog` holds the configured trigger phrases in priority order.
//! `scan` walks a lowercased transcript and emits at most one hit per phrase,
//! no matter how many times its literals occur; the first matching literal is
//! reported so notifications can name what was actually said.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a voice-channel participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeakerId(pub u64);

impl std::fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant as reported by the voice platform. Automated accounts are
/// never captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speaker {
    pub id: SpeakerId,
    pub display_name: String,
    pub is_bot: bool,
}

impl Speaker {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id: SpeakerId(id),
            display_name: display_name.into(),
            is_bot: false,
        }
    }
}

/// What the engine does when a phrase is heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhraseKind {
    /// Mute + warn the speaker, kick after repeat offenses.
    Forbidden,
    /// Count room-wide; play the celebration clip at the windowed threshold.
    Celebration,
}

/// One configured trigger phrase: a key, its kind, and the literal substrings
/// that count as saying it. Immutable once the catalog is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerPhrase {
    pub key: String,
    pub kind: PhraseKind,
    pub patterns: Vec<String>,
}

impl TriggerPhrase {
    pub fn new(key: impl Into<String>, kind: PhraseKind, patterns: &[&str]) -> Self {
        Self {
            key: key.into(),
            kind,
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

/// One detected phrase in one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseHit {
    pub phrase: String,
    pub kind: PhraseKind,
    /// The literal that matched, e.g. "rift" for the league phrase.
    pub literal: String,
}

/// A hit attributed to a speaker, ready for the enforcer.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    pub speaker: Speaker,
    pub phrase: String,
    pub kind: PhraseKind,
    pub literal: String,
    pub at: DateTime<Utc>,
}

impl MatchEvent {
    pub fn new(speaker: Speaker, hit: PhraseHit) -> Self {
        Self {
            speaker,
            phrase: hit.phrase,
            kind: hit.kind,
            literal: hit.literal,
            at: Utc::now(),
        }
    }
}

/// The configured set of trigger phrases, in priority order.
#[derive(Debug, Clone)]
pub struct PhraseCatalog {
    phrases: Vec<TriggerPhrase>,
}

impl PhraseCatalog {
    pub fn new(phrases: Vec<TriggerPhrase>) -> Self {
        Self { phrases }
    }

    /// The catalog the bot ships with: the league phrase (muted) and the
    /// brass monkey chant (celebrated).
    pub fn standard() -> Self {
        Self::new(vec![
            TriggerPhrase::new("league", PhraseKind::Forbidden, &["league", "rift"]),
            TriggerPhrase::new("brass_monkey", PhraseKind::Celebration, &["brass monkey"]),
        ])
    }

    pub fn phrases(&self) -> &[TriggerPhrase] {
        &self.phrases
    }

    /// Scan a lowercased transcript. At most one hit per phrase; hits come
    /// back in catalog order, not transcript order. Empty or whitespace-only
    /// transcripts match nothing.
    pub fn scan(&self, transcript: &str) -> Vec<PhraseHit> {
        if transcript.trim().is_empty() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for phrase in &self.phrases {
            if let Some(literal) = phrase
                .patterns
                .iter()
                .find(|p| !p.is_empty() && transcript.contains(p.as_str()))
            {
                hits.push(PhraseHit {
                    phrase: phrase.key.clone(),
                    kind: phrase.kind,
                    literal: literal.clone(),
                });
            }
        }
        hits
    }
}
