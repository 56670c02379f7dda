//! User profile and onboarding data models.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::imagegen::InlineImage;

/// Maximum number of reference photos a profile may carry.
pub const MAX_PHOTOS: usize = 3;

/// Goal options offered by the onboarding wizard.
pub const GOALS: [&str; 6] = [
    "Fat loss",
    "Muscle gain",
    "Improved posture",
    "More energy",
    "Better endurance",
    "Strength building",
];

/// Workout style options (single select).
pub const WORKOUT_STYLES: [&str; 6] = [
    "Weight training",
    "HIIT",
    "Yoga/Pilates",
    "Running/Cardio",
    "CrossFit",
    "Swimming",
];

/// Focus area options.
pub const FOCUS_AREAS: [&str; 6] = [
    "Core/Abs",
    "Arms",
    "Legs",
    "Back",
    "Shoulders",
    "Full body",
];

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,(?P<data>.*)$")
        .expect("data URL pattern is valid")
});

/// A reference photo uploaded during onboarding.
///
/// Browsers hand these over as `data:image/...;base64,...` URLs; we keep the
/// decoded bytes and serialize back to the same data URL form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferencePhoto {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReferencePhoto {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ProfileError> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(ProfileError::InvalidPhoto(format!(
                "unsupported content type {mime_type}"
            )));
        }
        if bytes.is_empty() {
            return Err(ProfileError::InvalidPhoto("empty image".to_string()));
        }
        Ok(Self { mime_type, bytes })
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, ProfileError> {
        let caps = DATA_URL
            .captures(url.trim())
            .ok_or_else(|| ProfileError::InvalidPhoto("not a base64 data URL".to_string()))?;
        let bytes = STANDARD
            .decode(&caps["data"])
            .map_err(|e| ProfileError::InvalidPhoto(format!("bad base64 payload: {e}")))?;
        Self::new(caps["mime"].to_ascii_lowercase(), bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// The photo as a reference part for an image prompt.
    pub fn to_inline_image(&self) -> InlineImage {
        InlineImage::new(self.mime_type.clone(), self.bytes.clone())
    }
}

impl TryFrom<String> for ReferencePhoto {
    type Error = ProfileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_data_url(&value)
    }
}

impl From<ReferencePhoto> for String {
    fn from(photo: ReferencePhoto) -> Self {
        photo.to_data_url()
    }
}

impl std::fmt::Debug for ReferencePhoto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferencePhoto")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Raw profile as submitted by the client, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileInput {
    pub photos: Vec<ReferencePhoto>,
    pub goals: Vec<String>,
    pub workout_style: String,
    pub focus_areas: Vec<String>,
    pub confidence_goals: String,
}

/// The user's answers to the onboarding questionnaire.
///
/// Only constructed through validation, and never mutated afterwards. A
/// calendar session holds it behind an `Arc` for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ProfileInput")]
pub struct Profile {
    photos: Vec<ReferencePhoto>,
    goals: Vec<String>,
    workout_style: String,
    focus_areas: Vec<String>,
    confidence_goals: String,
}

impl Profile {
    pub fn new(
        photos: Vec<ReferencePhoto>,
        goals: Vec<String>,
        workout_style: impl Into<String>,
        focus_areas: Vec<String>,
        confidence_goals: impl Into<String>,
    ) -> Result<Self, ProfileError> {
        if photos.len() > MAX_PHOTOS {
            return Err(ProfileError::TooManyPhotos { max: MAX_PHOTOS });
        }

        let goals = normalize_labels(goals);
        if goals.is_empty() {
            return Err(ProfileError::MissingField("goals"));
        }

        let workout_style = workout_style.into().trim().to_string();
        if workout_style.is_empty() {
            return Err(ProfileError::MissingField("workoutStyle"));
        }

        let focus_areas = normalize_labels(focus_areas);
        if focus_areas.is_empty() {
            return Err(ProfileError::MissingField("focusAreas"));
        }

        Ok(Self {
            photos,
            goals,
            workout_style,
            focus_areas,
            confidence_goals: confidence_goals.into().trim().to_string(),
        })
    }

    pub fn photos(&self) -> &[ReferencePhoto] {
        &self.photos
    }

    /// The photo attached to generation requests, if any.
    pub fn primary_photo(&self) -> Option<&ReferencePhoto> {
        self.photos.first()
    }

    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    pub fn workout_style(&self) -> &str {
        &self.workout_style
    }

    pub fn focus_areas(&self) -> &[String] {
        &self.focus_areas
    }

    pub fn confidence_goals(&self) -> &str {
        &self.confidence_goals
    }
}

impl TryFrom<ProfileInput> for Profile {
    type Error = ProfileError;

    fn try_from(input: ProfileInput) -> Result<Self, Self::Error> {
        Profile::new(
            input.photos,
            input.goals,
            input.workout_style,
            input.focus_areas,
            input.confidence_goals,
        )
    }
}

/// Trim, drop empties, and dedupe while keeping first-seen order.
fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if !label.is_empty() && !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}
