//! Generation tasks: one per (month, path) pair.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

use super::months::{MONTHS, MonthEntry};

/// Number of (month, path) tasks in a calendar.
pub const TASK_COUNT: usize = MONTHS.len() * 2;

/// Which version of the user a picture shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Path {
    /// The aspirational version.
    Gym,
    /// The cautionary version.
    Lazy,
}

impl Path {
    pub const ALL: [Path; 2] = [Path::Gym, Path::Lazy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gym => "gym",
            Self::Lazy => "lazy",
        }
    }

    /// Human label used on placeholders.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gym => "Gym Path",
            Self::Lazy => "Lazy Path",
        }
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Path {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gym" => Ok(Self::Gym),
            "lazy" => Ok(Self::Lazy),
            other => Err(format!("Unknown path: {other}")),
        }
    }
}

/// Identity of a generation task and of the slot that tracks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTaskKey")]
pub struct TaskKey {
    month_index: u8,
    path: Path,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaskKey {
    month_index: u8,
    path: Path,
}

impl TryFrom<RawTaskKey> for TaskKey {
    type Error = SessionError;

    fn try_from(raw: RawTaskKey) -> Result<Self, Self::Error> {
        TaskKey::new(raw.month_index, raw.path)
    }
}

impl TaskKey {
    pub fn new(month_index: u8, path: Path) -> Result<Self, SessionError> {
        if month_index as usize >= MONTHS.len() {
            return Err(SessionError::InvalidMonth(month_index));
        }
        Ok(Self { month_index, path })
    }

    pub fn month_index(&self) -> u8 {
        self.month_index
    }

    pub fn path(&self) -> Path {
        self.path
    }

    pub fn month(&self) -> &'static MonthEntry {
        &MONTHS[self.month_index as usize]
    }

    /// Position of this task in catalog order (gym before lazy).
    pub fn slot_index(&self) -> usize {
        self.month_index as usize * 2
            + match self.path {
                Path::Gym => 0,
                Path::Lazy => 1,
            }
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.month().name, self.path)
    }
}

/// All tasks in catalog order, gym before lazy within each month.
pub fn all_tasks() -> Vec<TaskKey> {
    MONTHS
        .iter()
        .flat_map(|m| {
            Path::ALL.into_iter().map(move |path| TaskKey {
                month_index: m.index,
                path,
            })
        })
        .collect()
}
