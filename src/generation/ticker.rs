//! Cosmetic progress ticker for a generating slot.

use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::board::SlotBoard;
use super::slot::DispatchToken;

/// Background task nudging one dispatch's progress. Aborted on drop, so it
/// stops no later than the moment the owning task settles the slot.
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn spawn(board: Arc<SlotBoard>, token: DispatchToken) -> Self {
        let tick = board.progress_config().tick;
        let max_step = board.progress_config().max_step.max(1);

        let handle = tokio::spawn(async move {
            let mut ticks = interval(tick);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let step = rand::thread_rng().gen_range(1..=max_step);
                if !board.nudge(token, step).await {
                    break;
                }
            }
        });

        Self { handle }
    }

    /// Stop ticking now.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
