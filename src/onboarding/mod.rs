//! The onboarding questionnaire that produces a user's `Profile`.
//!
//! The wizard walks through reference photos, goals, workout style, focus
//! areas and free-text confidence goals. Once complete, the resulting profile
//! is handed to a calendar session and never changes for that session.

pub mod model;
pub mod routes;
pub mod state;

pub use model::{
    FOCUS_AREAS, GOALS, MAX_PHOTOS, Profile, ProfileInput, ReferencePhoto, WORKOUT_STYLES,
};
pub use routes::onboarding_routes;
pub use state::{OnboardingState, OnboardingStep, ProfileDraft};
