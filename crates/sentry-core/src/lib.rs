//! # Sentry Core - Voice-channel phrase moderation engine
//!
//! Watches one voice channel at a time, transcribes each speaker's
//! utterances, and escalates when configured trigger phrases show up:
//! temporary mute with a warning clip, forced disconnect after repeat
//! offenses, and a celebration clip when the whole room chants a phrase
//! enough times inside one counting window.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Session Controller                       │
//! │  speaking events → per-speaker Capture → Transcriber port    │
//! │                                  ↓                           │
//! │                          Phrase Catalog                      │
//! │                                  ↓                           │
//! │  ┌─────────────┐          ┌───────────┐                      │
//! │  │ Tally Board │ ←──────→ │  Enforcer │ → mute / kick /      │
//! │  │  (DashMap)  │          └───────────┘   clips / notices    │
//! │  └─────────────┘                                             │
//! │        ↑                                                     │
//! │  Window Reset (10s timer, process lifetime)                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine talks to the outside world only through the ports in
//! [`actions`] and [`stt`]; the Discord and Google Speech adapters live in
//! the `sentry-bot` binary.

pub mod actions;
pub mod config;
pub mod enforcer;
pub mod error;
pub mod phrase;
pub mod session;
pub mod stt;
pub mod tally;
pub mod window;

pub use actions::{
    ActionRecorder, ClipPlayer, Notifier, NotifyTarget, RecordedAction, VoiceControl, VoiceLink,
    VoiceTarget,
};
pub use config::SentryConfig;
pub use enforcer::Enforcer;
pub use error::{SentryError, SentryResult};
pub use phrase::{
    MatchEvent, PhraseCatalog, PhraseHit, PhraseKind, Speaker, SpeakerId, TriggerPhrase,
};
pub use session::SessionController;
pub use stt::{AudioSegment, ScriptedTranscriber, Transcriber};
pub use tally::TallyBoard;
pub use window::WindowReset;
