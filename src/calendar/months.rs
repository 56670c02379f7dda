//! The twelve months of the calendar and their themes.

use serde::Serialize;

use super::task::Path;

/// One month of the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthEntry {
    pub index: u8,
    pub name: &'static str,
    pub theme: &'static str,
    /// Shown in place of the gym image until one exists.
    pub gym_description: &'static str,
    /// Shown in place of the lazy image until one exists.
    pub lazy_description: &'static str,
}

impl MonthEntry {
    /// Lowercase month name, used in artifact paths.
    pub fn slug(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    pub fn description(&self, path: Path) -> &'static str {
        match path {
            Path::Gym => self.gym_description,
            Path::Lazy => self.lazy_description,
        }
    }
}

pub const MONTHS: [MonthEntry; 12] = [
    MonthEntry {
        index: 0,
        name: "January",
        theme: "New Beginnings",
        gym_description: "Early progress. User leaving Equinox, subtle fat loss, improved posture, hopeful expression aligned with stated goals.",
        lazy_description: "Winter couch scene, snacking and TV, slouched posture, tired face.",
    },
    MonthEntry {
        index: 1,
        name: "February",
        theme: "Momentum vs Comfort",
        gym_description: "Noticeable tone improvements, tighter core, confident walk, calm focus.",
        lazy_description: "Same outfit feels tighter, lethargic mood, comfort food visible.",
    },
    MonthEntry {
        index: 2,
        name: "March",
        theme: "Spring Awakening",
        gym_description: "Leaner silhouette, clearer skin, energized expression, spring light.",
        lazy_description: "Still indoors, heavier look, messy environment, low motivation.",
    },
    MonthEntry {
        index: 3,
        name: "April",
        theme: "Consistency",
        gym_description: "Visible muscle definition or fat reduction per goals, relaxed confidence.",
        lazy_description: "Incremental weight gain, passive scrolling, mild regret.",
    },
    MonthEntry {
        index: 4,
        name: "May",
        theme: "Pre-Summer Confidence",
        gym_description: "Athletic proportions emerging, open body language, vibrant colors.",
        lazy_description: "Self-conscious posture, emotional eating, avoidance behaviors.",
    },
    MonthEntry {
        index: 5,
        name: "June",
        theme: "Summer Energy",
        gym_description: "Strong, fit physique clearly aligned with goals, glowing skin, social ease.",
        lazy_description: "Sluggish, overheated, greasy food, dissatisfaction.",
    },
    MonthEntry {
        index: 6,
        name: "July",
        theme: "Peak vs Plateau",
        gym_description: "Peak conditioning for goals: lean, strong, confident stance.",
        lazy_description: "Bloated appearance, zoning out, low energy.",
    },
    MonthEntry {
        index: 7,
        name: "August",
        theme: "Sustain or Slip",
        gym_description: "Sustainable fitness look, calm strength, balanced lifestyle cues.",
        lazy_description: "Inactivity burnout, visible frustration, comfort eating.",
    },
    MonthEntry {
        index: 8,
        name: "September",
        theme: "Back on Track",
        gym_description: "Sharp, disciplined appearance, refined body composition.",
        lazy_description: "Heavier and resigned, stuck in habits.",
    },
    MonthEntry {
        index: 9,
        name: "October",
        theme: "Discipline Pays",
        gym_description: "Defined physique, strong posture, composed confidence.",
        lazy_description: "Comfort-food season, dull lighting, emotional eating.",
    },
    MonthEntry {
        index: 10,
        name: "November",
        theme: "Gratitude vs Regret",
        gym_description: "Healthy, grounded, fit body reflecting year-long progress.",
        lazy_description: "Overindulgence, lethargy, regret visible in expression.",
    },
    MonthEntry {
        index: 11,
        name: "December",
        theme: "Year-End Contrast",
        gym_description: "Best version of the user per goals: fit, confident, fulfilled.",
        lazy_description: "Tired, heavier, sad realization of missed opportunities.",
    },
];

/// Look up a month by zero-based index.
pub fn month(index: u8) -> Option<&'static MonthEntry> {
    MONTHS.get(index as usize)
}

/// Look up a month by name, ignoring case.
pub fn month_by_name(name: &str) -> Option<&'static MonthEntry> {
    let name = name.trim();
    MONTHS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}
