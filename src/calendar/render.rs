//! Calendar render model. Pure functions from slot state to displayable cells.
//!
//! Nothing here triggers generation or touches shared state; the same slot
//! snapshot always renders to the same cell.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::generation::SlotSnapshot;

use super::months::{MONTHS, MonthEntry};
use super::task::{Path, TaskKey};

/// What to draw in one half of a calendar page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarCell {
    Image {
        url: String,
    },
    Placeholder {
        label: &'static str,
        month: &'static str,
        theme: &'static str,
        description: &'static str,
    },
}

impl CalendarCell {
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// Themed placeholder for a task with no image.
pub fn placeholder(key: TaskKey) -> CalendarCell {
    let month = key.month();
    CalendarCell::Placeholder {
        label: key.path().label(),
        month: month.name,
        theme: month.theme,
        description: month.description(key.path()),
    }
}

/// Render one slot. Failed and not-yet-attempted slots look the same.
pub fn render_cell(slot: &SlotSnapshot) -> CalendarCell {
    match &slot.image_url {
        Some(url) => CalendarCell::Image { url: url.clone() },
        None => placeholder(slot.key),
    }
}

/// One day in a month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDay {
    pub date: NaiveDate,
    pub day: u32,
    /// False for the leading/trailing days borrowed from adjacent months.
    pub in_month: bool,
}

/// Monday-first weeks covering the whole month, padded with adjacent days.
///
/// `month0` is zero-based. Returns `None` for an out-of-range month or year.
pub fn month_grid(year: i32, month0: u8) -> Option<Vec<Vec<GridDay>>> {
    let first = NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1)?;
    let next_first = if month0 == 11 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month0 as u32 + 2, 1)?
    };
    let last = next_first.pred_opt()?;

    let start = first - Duration::days(first.weekday().num_days_from_monday() as i64);
    let end = last + Duration::days(6 - last.weekday().num_days_from_monday() as i64);

    let mut weeks = Vec::new();
    let mut week = Vec::with_capacity(7);
    let mut date = start;
    while date <= end {
        week.push(GridDay {
            date,
            day: date.day(),
            in_month: date.month() == first.month(),
        });
        if week.len() == 7 {
            weeks.push(std::mem::take(&mut week));
        }
        date = date.succ_opt()?;
    }
    Some(weeks)
}

/// One printable page: both images for a month over its day grid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarPage {
    pub month_index: u8,
    pub month: &'static str,
    pub theme: &'static str,
    pub year: i32,
    pub gym: CalendarCell,
    pub lazy: CalendarCell,
    pub weeks: Vec<Vec<GridDay>>,
}

/// The consolidated twelve-page calendar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarView {
    pub year: i32,
    pub pages: Vec<CalendarPage>,
    /// At least one image exists, so printing makes sense.
    pub any_generated: bool,
    pub all_generated: bool,
}

fn cell_for(slots: &[SlotSnapshot], month: &MonthEntry, path: Path) -> CalendarCell {
    slots
        .iter()
        .find(|s| s.key.month_index() == month.index && s.key.path() == path)
        .map(render_cell)
        .unwrap_or_else(|| {
            CalendarCell::Placeholder {
                label: path.label(),
                month: month.name,
                theme: month.theme,
                description: month.description(path),
            }
        })
}

/// Render a single month page.
pub fn render_page(year: i32, month: &MonthEntry, slots: &[SlotSnapshot]) -> CalendarPage {
    CalendarPage {
        month_index: month.index,
        month: month.name,
        theme: month.theme,
        year,
        gym: cell_for(slots, month, Path::Gym),
        lazy: cell_for(slots, month, Path::Lazy),
        weeks: month_grid(year, month.index).unwrap_or_default(),
    }
}

/// Render the full calendar from a slot snapshot.
pub fn render_view(year: i32, slots: &[SlotSnapshot]) -> CalendarView {
    let pages: Vec<CalendarPage> = MONTHS
        .iter()
        .map(|month| render_page(year, month, slots))
        .collect();
    let any_generated = pages.iter().any(|p| p.gym.is_image() || p.lazy.is_image());
    let all_generated = pages.iter().all(|p| p.gym.is_image() && p.lazy.is_image());
    CalendarView {
        year,
        pages,
        any_generated,
        all_generated,
    }
}
