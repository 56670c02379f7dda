//! Per-task slot state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{Path, TaskKey};
use crate::error::SessionError;

/// Lifecycle of one (month, path) slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Never attempted.
    #[default]
    Idle,
    /// A request is in flight.
    Generating,
    /// An image is stored and its URL recorded.
    Done,
    /// The last attempt gave up; can be dispatched again.
    Failed,
}

impl SlotStatus {
    /// Check if this status allows transitioning to another status.
    ///
    /// `Done -> Generating` is structurally allowed here; whether a particular
    /// dispatch may take it is decided by [`SlotStatus::accepts`].
    pub fn can_transition_to(&self, target: SlotStatus) -> bool {
        use SlotStatus::*;

        matches!(
            (self, target),
            (Idle, Generating)
                | (Generating, Done)
                | (Generating, Failed)
                | (Generating, Generating)
                | (Failed, Generating)
                | (Done, Generating)
        )
    }

    /// Whether a dispatch of `kind` may start from this status.
    pub fn accepts(&self, kind: DispatchKind) -> bool {
        match self {
            Self::Idle | Self::Failed => true,
            Self::Generating | Self::Done => kind == DispatchKind::Regenerate,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Who asked for a slot to be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    Batch,
    /// Explicit user request; may replace a finished or in-flight result.
    Regenerate,
}

/// Identifies one dispatch of one slot. Only the newest token for a slot can
/// move its progress or settle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchToken {
    pub key: TaskKey,
    pub version: u64,
}

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Done { image_url: String },
    Failed { error: String },
}

/// Mutable record for one task. Lives inside the `SlotBoard`.
#[derive(Debug, Clone)]
pub struct GenerationSlot {
    pub key: TaskKey,
    pub status: SlotStatus,
    pub image_url: Option<String>,
    /// Cosmetic estimate in 0..=100.
    pub progress: u8,
    /// Bumped on every dispatch.
    pub version: u64,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationSlot {
    pub fn new(key: TaskKey) -> Self {
        Self {
            key,
            status: SlotStatus::Idle,
            image_url: None,
            progress: 0,
            version: 0,
            error: None,
            updated_at: Utc::now(),
        }
    }

    fn transition_to(&mut self, target: SlotStatus) -> Result<(), SessionError> {
        if !self.status.can_transition_to(target) {
            return Err(SessionError::InvalidTransition {
                slot: self.key.to_string(),
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Start a new dispatch, superseding any earlier one.
    pub fn begin(&mut self, kind: DispatchKind, initial: u8) -> Result<DispatchToken, SessionError> {
        if !self.status.accepts(kind) {
            return Err(SessionError::InvalidTransition {
                slot: self.key.to_string(),
                from: self.status.to_string(),
                to: SlotStatus::Generating.to_string(),
            });
        }
        self.transition_to(SlotStatus::Generating)?;
        self.version += 1;
        self.progress = initial;
        self.image_url = None;
        self.error = None;
        Ok(DispatchToken {
            key: self.key,
            version: self.version,
        })
    }

    pub fn is_current(&self, token: DispatchToken) -> bool {
        token.key == self.key && token.version == self.version
    }

    /// Add `step` to the progress estimate, never past `cap`. Returns false
    /// once the token no longer owns a generating slot.
    pub fn advance(&mut self, token: DispatchToken, step: u8, cap: u8) -> bool {
        if !self.is_current(token) || self.status != SlotStatus::Generating {
            return false;
        }
        let next = self.progress.saturating_add(step).min(cap);
        if next > self.progress {
            self.progress = next;
            self.updated_at = Utc::now();
        }
        true
    }

    /// Record the result of a dispatch. A stale token changes nothing.
    pub fn settle(&mut self, token: DispatchToken, outcome: SlotOutcome) -> bool {
        if !self.is_current(token) || self.status != SlotStatus::Generating {
            return false;
        }
        let settled = match outcome {
            SlotOutcome::Done { image_url } => self.transition_to(SlotStatus::Done).map(|_| {
                self.image_url = Some(image_url);
                self.progress = 100;
                self.error = None;
            }),
            SlotOutcome::Failed { error } => self.transition_to(SlotStatus::Failed).map(|_| {
                self.image_url = None;
                self.progress = 0;
                self.error = Some(error);
            }),
        };
        settled.is_ok()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            key: self.key,
            month: self.key.month().name,
            status: self.status,
            progress: self.progress,
            image_url: self.image_url.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Read-only view of a slot, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
    #[serde(flatten)]
    pub key: TaskKey,
    pub month: &'static str,
    pub status: SlotStatus,
    pub progress: u8,
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SlotSnapshot {
    pub fn path(&self) -> Path {
        self.key.path()
    }
}
