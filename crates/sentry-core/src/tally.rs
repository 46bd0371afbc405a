//! Concurrent phrase counters
//!
//! Two boards: a windowed room-wide count per phrase (zeroed by the reset
//! timer) and a cumulative per-speaker count per phrase (lives for the whole
//! process). Capture tasks bump these concurrently; DashMap gives per-key
//! atomicity so increments are never lost or cross-contaminated.

use dashmap::DashMap;
use tracing::debug;

use crate::phrase::SpeakerId;

/// Shared counter store. Both bump operations return the post-increment
/// value; threshold checks always use that value, so a speaker's first
/// offense counts as 1.
#[derive(Debug, Default)]
pub struct TallyBoard {
    window: DashMap<String, u64>,
    by_speaker: DashMap<(String, SpeakerId), u64>,
}

impl TallyBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically increment the windowed room-wide count for a phrase.
    pub fn bump_window(&self, phrase: &str) -> u64 {
        let mut entry = self.window.entry(phrase.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Atomically increment the cumulative count of `speaker` for a phrase.
    pub fn bump_speaker(&self, phrase: &str, speaker: SpeakerId) -> u64 {
        let mut entry = self
            .by_speaker
            .entry((phrase.to_string(), speaker))
            .or_insert(0);
        *entry += 1;
        *entry
    }

    /// Current windowed count; 0 for phrases never seen this window.
    pub fn window_count(&self, phrase: &str) -> u64 {
        self.window.get(phrase).map(|e| *e).unwrap_or(0)
    }

    /// Current cumulative count for (phrase, speaker); 0 if never seen.
    pub fn speaker_count(&self, phrase: &str, speaker: SpeakerId) -> u64 {
        self.by_speaker
            .get(&(phrase.to_string(), speaker))
            .map(|e| *e)
            .unwrap_or(0)
    }

    /// Zero every windowed count. Called by the reset timer only. Each key is
    /// zeroed under its own lock; a racing bump lands in the old window or
    /// the new one, never nowhere.
    pub fn reset_window(&self) {
        for mut entry in self.window.iter_mut() {
            if *entry.value() > 0 {
                debug!(phrase = %entry.key(), count = *entry.value(), "window reset");
            }
            *entry.value_mut() = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_bump_counts_as_one() {
        let board = TallyBoard::new();
        assert_eq!(board.bump_speaker("league", SpeakerId(1)), 1);
        assert_eq!(board.bump_speaker("league", SpeakerId(1)), 2);
        assert_eq!(board.speaker_count("league", SpeakerId(1)), 2);
        // A different speaker starts from scratch
        assert_eq!(board.bump_speaker("league", SpeakerId(2)), 1);
    }

    #[test]
    fn window_and_speaker_counts_are_independent() {
        let board = TallyBoard::new();
        board.bump_window("brass_monkey");
        board.bump_window("brass_monkey");
        assert_eq!(board.window_count("brass_monkey"), 2);
        assert_eq!(board.speaker_count("brass_monkey", SpeakerId(1)), 0);
    }

    #[test]
    fn reset_zeroes_all_windowed_counts() {
        let board = TallyBoard::new();
        board.bump_window("league");
        board.bump_window("brass_monkey");
        board.bump_speaker("league", SpeakerId(9));
        board.reset_window();
        assert_eq!(board.window_count("league"), 0);
        assert_eq!(board.window_count("brass_monkey"), 0);
        // Cumulative counts survive the window reset
        assert_eq!(board.speaker_count("league", SpeakerId(9)), 1);
    }

    #[test]
    fn reset_with_no_traffic_is_a_noop() {
        let board = TallyBoard::new();
        board.reset_window();
        board.reset_window();
        assert_eq!(board.window_count("league"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bumps_are_never_lost() {
        let board = Arc::new(TallyBoard::new());
        let mut handles = Vec::new();
        // Two speakers bumping 1,000 times each, concurrently
        for speaker in [SpeakerId(1), SpeakerId(2)] {
            let board = Arc::clone(&board);
            handles.push(tokio::spawn(async move {
                for _ in 0..1_000 {
                    board.bump_window("brass_monkey");
                    board.bump_speaker("brass_monkey", speaker);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(board.window_count("brass_monkey"), 2_000);
        assert_eq!(board.speaker_count("brass_monkey", SpeakerId(1)), 1_000);
        assert_eq!(board.speaker_count("brass_monkey", SpeakerId(2)), 1_000);
    }
}
