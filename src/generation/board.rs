//! Slot board: the 24 slots of one calendar plus broadcast to subscribers.

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use crate::calendar::{TASK_COUNT, TaskKey, all_tasks};
use crate::config::ProgressConfig;
use crate::error::SessionError;

use super::slot::{DispatchKind, DispatchToken, GenerationSlot, SlotOutcome, SlotSnapshot, SlotStatus};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Event pushed to subscribers of a calendar session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A slot changed (dispatch, progress tick, or settlement).
    Slot { slot: SlotSnapshot },
    /// Batch `batch` of `batches` (1-based) was dispatched.
    BatchStarted { batch: usize, batches: usize },
    /// The batch run is over. Sent exactly once per run.
    #[serde(rename_all = "camelCase")]
    Finished {
        all_complete: bool,
        done: usize,
        failed: usize,
    },
}

/// Per-status slot counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotCounts {
    pub idle: usize,
    pub generating: usize,
    pub done: usize,
    pub failed: usize,
}

/// Explicit state container for a calendar's slots.
pub struct SlotBoard {
    slots: RwLock<Vec<GenerationSlot>>,
    tx: broadcast::Sender<SessionEvent>,
    progress: ProgressConfig,
}

impl SlotBoard {
    /// Create a board with every slot idle.
    pub fn new(progress: ProgressConfig) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let slots = all_tasks().into_iter().map(GenerationSlot::new).collect();
        Self {
            slots: RwLock::new(slots),
            tx,
            progress,
        }
    }

    pub fn progress_config(&self) -> &ProgressConfig {
        &self.progress
    }

    /// Subscribe to slot and batch events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        // Ok if nobody is listening
        let _ = self.tx.send(event);
    }

    /// Mark a slot Generating and hand out the token that owns it.
    pub async fn dispatch(
        &self,
        key: TaskKey,
        kind: DispatchKind,
    ) -> Result<DispatchToken, SessionError> {
        let (token, snapshot) = {
            let mut slots = self.slots.write().await;
            let slot = &mut slots[key.slot_index()];
            let token = slot.begin(kind, self.progress.initial)?;
            (token, slot.snapshot())
        };

        debug!(slot = %key, version = token.version, kind = ?kind, "Slot dispatched");
        self.publish(SessionEvent::Slot { slot: snapshot });
        Ok(token)
    }

    /// Bump the progress estimate of a generating slot.
    ///
    /// Returns false once the token is stale or the slot settled, which tells
    /// the ticker to stop.
    pub async fn nudge(&self, token: DispatchToken, step: u8) -> bool {
        let snapshot = {
            let mut slots = self.slots.write().await;
            let slot = &mut slots[token.key.slot_index()];
            let before = slot.progress;
            if !slot.advance(token, step, self.progress.cap) {
                return false;
            }
            (slot.progress != before).then(|| slot.snapshot())
        };

        if let Some(snapshot) = snapshot {
            self.publish(SessionEvent::Slot { slot: snapshot });
        }
        true
    }

    /// Record a dispatch result. Returns `None` if the token was superseded.
    pub async fn settle(&self, token: DispatchToken, outcome: SlotOutcome) -> Option<SlotSnapshot> {
        let snapshot = {
            let mut slots = self.slots.write().await;
            let slot = &mut slots[token.key.slot_index()];
            if !slot.settle(token, outcome) {
                debug!(slot = %token.key, version = token.version, "Dropping stale result");
                return None;
            }
            slot.snapshot()
        };

        info!(slot = %token.key, status = %snapshot.status, "Slot settled");
        self.publish(SessionEvent::Slot {
            slot: snapshot.clone(),
        });
        Some(snapshot)
    }

    /// All slots in catalog order.
    pub async fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots.read().await.iter().map(|s| s.snapshot()).collect()
    }

    pub async fn slot(&self, key: TaskKey) -> SlotSnapshot {
        self.slots.read().await[key.slot_index()].snapshot()
    }

    pub async fn counts(&self) -> SlotCounts {
        let slots = self.slots.read().await;
        let mut counts = SlotCounts::default();
        for slot in slots.iter() {
            match slot.status {
                SlotStatus::Idle => counts.idle += 1,
                SlotStatus::Generating => counts.generating += 1,
                SlotStatus::Done => counts.done += 1,
                SlotStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// True iff every slot is Done.
    pub async fn is_complete(&self) -> bool {
        self.counts().await.done == TASK_COUNT
    }
}
