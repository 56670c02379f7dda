//! Onboarding wizard state machine. Tracks which step the user is on and the
//! answers collected so far.

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

use super::model::{MAX_PHOTOS, Profile, ReferencePhoto};

/// The steps of the onboarding wizard.
///
/// Progresses linearly: Photos → Goals → WorkoutStyle → FocusAreas →
/// ConfidenceGoals → Complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Photos,
    Goals,
    WorkoutStyle,
    FocusAreas,
    ConfidenceGoals,
    Complete,
}

impl OnboardingStep {
    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<OnboardingStep> {
        use OnboardingStep::*;
        match self {
            Photos => Some(Goals),
            Goals => Some(WorkoutStyle),
            WorkoutStyle => Some(FocusAreas),
            FocusAreas => Some(ConfidenceGoals),
            ConfidenceGoals => Some(Complete),
            Complete => None,
        }
    }

    /// Get the previous step, if any.
    pub fn previous(&self) -> Option<OnboardingStep> {
        use OnboardingStep::*;
        match self {
            Photos => None,
            Goals => Some(Photos),
            WorkoutStyle => Some(Goals),
            FocusAreas => Some(WorkoutStyle),
            ConfidenceGoals => Some(FocusAreas),
            Complete => Some(ConfidenceGoals),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Photos => "photos",
            Self::Goals => "goals",
            Self::WorkoutStyle => "workout_style",
            Self::FocusAreas => "focus_areas",
            Self::ConfidenceGoals => "confidence_goals",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// Answers collected so far. Unlike `Profile`, a draft may be incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub photos: Vec<ReferencePhoto>,
    pub goals: Vec<String>,
    pub workout_style: Option<String>,
    pub focus_areas: Vec<String>,
    pub confidence_goals: String,
}

/// Wizard state: current step plus the draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnboardingState {
    pub step: OnboardingStep,
    pub draft: ProfileDraft,
}

impl OnboardingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the current step has enough input to move on.
    pub fn is_step_valid(&self) -> bool {
        match self.step {
            OnboardingStep::Photos => !self.draft.photos.is_empty(),
            OnboardingStep::Goals => !self.draft.goals.is_empty(),
            OnboardingStep::WorkoutStyle => self.draft.workout_style.is_some(),
            OnboardingStep::FocusAreas => !self.draft.focus_areas.is_empty(),
            OnboardingStep::ConfidenceGoals | OnboardingStep::Complete => true,
        }
    }

    /// Advance to the next step. Fails if the current step is incomplete.
    pub fn advance(&mut self) -> Result<OnboardingStep, ProfileError> {
        let next = self.step.next().ok_or(ProfileError::AlreadyComplete)?;
        if !self.is_step_valid() {
            return Err(ProfileError::StepIncomplete {
                step: self.step.to_string(),
            });
        }
        self.step = next;
        Ok(next)
    }

    /// Go back one step. Stays put on the first step.
    pub fn back(&mut self) -> OnboardingStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Add a reference photo. Photos past the limit are rejected.
    pub fn add_photo(&mut self, photo: ReferencePhoto) -> Result<(), ProfileError> {
        if self.draft.photos.len() >= MAX_PHOTOS {
            return Err(ProfileError::TooManyPhotos { max: MAX_PHOTOS });
        }
        self.draft.photos.push(photo);
        Ok(())
    }

    pub fn remove_photo(&mut self, index: usize) -> Option<ReferencePhoto> {
        (index < self.draft.photos.len()).then(|| self.draft.photos.remove(index))
    }

    pub fn toggle_goal(&mut self, goal: &str) {
        toggle(&mut self.draft.goals, goal);
    }

    pub fn set_workout_style(&mut self, style: &str) {
        let style = style.trim();
        self.draft.workout_style = (!style.is_empty()).then(|| style.to_string());
    }

    pub fn toggle_focus_area(&mut self, area: &str) {
        toggle(&mut self.draft.focus_areas, area);
    }

    pub fn set_confidence_goals(&mut self, text: impl Into<String>) {
        self.draft.confidence_goals = text.into();
    }

    /// Finish onboarding and produce the immutable profile.
    pub fn complete(&mut self) -> Result<Profile, ProfileError> {
        if self.draft.photos.is_empty() {
            return Err(ProfileError::StepIncomplete {
                step: OnboardingStep::Photos.to_string(),
            });
        }
        let profile = Profile::new(
            self.draft.photos.clone(),
            self.draft.goals.clone(),
            self.draft.workout_style.clone().unwrap_or_default(),
            self.draft.focus_areas.clone(),
            self.draft.confidence_goals.clone(),
        )?;
        self.step = OnboardingStep::Complete;
        Ok(profile)
    }
}

fn toggle(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if let Some(pos) = list.iter().position(|v| v == value) {
        list.remove(pos);
    } else {
        list.push(value.to_string());
    }
}
