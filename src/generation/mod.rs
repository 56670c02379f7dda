//! Batch generation of a calendar's 24 images.
//!
//! - **slot**: per-task state machine and dispatch tokens
//! - **board**: the slots of one calendar plus event fan-out
//! - **ticker**: cosmetic progress while a slot generates
//! - **session**: batch orchestration and single-slot regenerate
//! - **registry**: live sessions by id

pub mod board;
pub mod registry;
pub mod session;
pub mod slot;
pub mod ticker;

pub use board::{SessionEvent, SlotBoard, SlotCounts};
pub use registry::SessionRegistry;
pub use session::{BatchSummary, CalendarSession, SessionDeps};
pub use slot::{DispatchKind, DispatchToken, GenerationSlot, SlotOutcome, SlotSnapshot, SlotStatus};
pub use ticker::ProgressTicker;
