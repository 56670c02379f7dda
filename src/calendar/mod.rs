//! Calendar domain: the month catalog, generation tasks, prompt templates,
//! and the pure render model consumed by the presentation layer.

pub mod months;
pub mod prompts;
pub mod render;
pub mod task;

pub use months::{MONTHS, MonthEntry, month, month_by_name};
pub use prompts::{PromptInput, build_prompt};
pub use render::{CalendarCell, CalendarPage, CalendarView, GridDay, render_cell, render_view};
pub use task::{Path, TASK_COUNT, TaskKey, all_tasks};
