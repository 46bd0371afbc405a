//! Windowed-counter reset timer
//!
//! A process-lifetime background task that zeroes the room-wide windowed
//! counts on a fixed period, whether or not a session is active. Owned as an
//! explicit handle with a shutdown hook; dropping the handle stops the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::tally::TallyBoard;

pub struct WindowReset {
    handle: JoinHandle<()>,
}

impl WindowReset {
    /// Spawn the reset task. The first reset happens one full period after
    /// the spawn, then every period regardless of traffic.
    pub fn spawn(board: Arc<TallyBoard>, period: Duration) -> Self {
        info!(period_secs = period.as_secs(), "window reset timer started");
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // interval fires immediately once; the fresh board needs no reset
            interval.tick().await;
            loop {
                interval.tick().await;
                debug!("window reset tick");
                board.reset_window();
            }
        });
        Self { handle }
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for WindowReset {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_are_zero_right_after_a_reset() {
        let board = Arc::new(TallyBoard::new());
        let _reset = WindowReset::spawn(Arc::clone(&board), Duration::from_secs(10));
        tokio::task::yield_now().await;

        board.bump_window("brass_monkey");
        board.bump_window("brass_monkey");
        assert_eq!(board.window_count("brass_monkey"), 2);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(board.window_count("brass_monkey"), 0);

        // Counts accumulate again in the next window
        board.bump_window("brass_monkey");
        assert_eq!(board.window_count("brass_monkey"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_with_no_traffic_change_nothing() {
        let board = Arc::new(TallyBoard::new());
        let _reset = WindowReset::spawn(Arc::clone(&board), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(board.window_count("league"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_timer() {
        let board = Arc::new(TallyBoard::new());
        let reset = WindowReset::spawn(Arc::clone(&board), Duration::from_secs(10));
        tokio::task::yield_now().await;
        reset.shutdown();

        board.bump_window("league");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(board.window_count("league"), 1);
    }
}
