//! Prompt templates for the image provider.

use crate::onboarding::Profile;

use super::months::MonthEntry;
use super::task::Path;

/// Scene direction for the gym path, per month.
fn gym_scene(month: &MonthEntry) -> &'static str {
    match month.index {
        0 => "Early progress visible, hopeful expression, starting the fitness journey",
        1 => "Noticeable tone improvements, tighter core, confident demeanor",
        2 => "Leaner silhouette, clearer skin, energized spring vibes",
        3 => "Visible muscle definition, relaxed confidence, consistent progress",
        4 => "Athletic proportions emerging, open body language, pre-summer readiness",
        5 => "Strong fit physique, glowing skin, summer energy and social confidence",
        6 => "Peak conditioning, lean and strong, maximum confidence",
        7 => "Sustainable fitness, calm strength, balanced lifestyle",
        8 => "Sharp disciplined appearance, refined body composition",
        9 => "Defined physique, strong posture, composed confidence",
        10 => "Healthy grounded appearance, reflecting year-long progress",
        11 => "Best version achieved, fit confident fulfilled look",
        _ => "Fit and healthy appearance",
    }
}

/// Scene direction for the lazy path, per month.
fn lazy_scene(month: &MonthEntry) -> &'static str {
    match month.index {
        0 => "Winter couch scene with snacks and TV, slouched posture",
        1 => "Clothes feeling tighter, lethargic mood, comfort food visible",
        2 => "Still indoors, heavier appearance, messy environment",
        3 => "Incremental weight gain visible, passive scrolling on phone",
        4 => "Self-conscious posture, emotional eating signs",
        5 => "Sluggish summer look, overheated, unhealthy food choices",
        6 => "Bloated appearance, zoning out, very low energy",
        7 => "Inactivity burnout visible, comfort eating",
        8 => "Heavier and resigned appearance, stuck in habits",
        9 => "Comfort food season indulgence, dull lighting",
        10 => "Overindulgence visible, lethargy, mild regret in expression",
        11 => "Tired and heavier, realization of missed opportunities",
        _ => "Sedentary lifestyle appearance",
    }
}

/// Inputs for one prompt. Borrowed so the HTTP glue can build prompts
/// without a full `Profile`.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub goals: &'a [String],
    pub workout_style: &'a str,
    pub focus_areas: &'a [String],
    pub confidence_goals: &'a str,
    pub has_reference: bool,
}

impl<'a> PromptInput<'a> {
    pub fn from_profile(profile: &'a Profile) -> Self {
        Self {
            goals: profile.goals(),
            workout_style: profile.workout_style(),
            focus_areas: profile.focus_areas(),
            confidence_goals: profile.confidence_goals(),
            has_reference: profile.primary_photo().is_some(),
        }
    }
}

/// Build the prompt text for one (month, path) image.
pub fn build_prompt(month: &MonthEntry, path: Path, input: &PromptInput<'_>) -> String {
    let goals = if input.goals.is_empty() {
        "general fitness".to_string()
    } else {
        input.goals.join(", ")
    };
    let focus = if input.focus_areas.is_empty() {
        "full body".to_string()
    } else {
        input.focus_areas.join(", ")
    };

    let mut prompt = match path {
        Path::Gym => {
            let mut text = format!(
                "Create a cinematic, high-end, realistic photograph of a fit, healthy person at a premium Equinox-style gym. \
                 The person shows visible progress towards {goals} goals, with focus on {focus}. \
                 {theme} theme - {scene}. ",
                theme = month.theme,
                scene = gym_scene(month),
            );
            if !input.workout_style.is_empty() {
                text.push_str(&format!("They are mid-session doing {}. ", input.workout_style));
            }
            if !input.confidence_goals.is_empty() {
                text.push_str(&format!(
                    "They embody this personal goal: {}. ",
                    input.confidence_goals
                ));
            }
            text.push_str(
                "Flattering, premium lighting. The person looks confident, healthy, and motivated. \
                 Style: Editorial fitness photography, aspirational, premium aesthetic.",
            );
            text
        }
        Path::Lazy => format!(
            "Create a cinematic, realistic photograph of a person at home on a couch. \
             The person shows signs of sedentary lifestyle and unhealthy habits. \
             {theme} theme - {scene}. \
             Duller, unflattering lighting. The person looks tired and unmotivated. \
             Style: Documentary photography, realistic but not insulting.",
            theme = month.theme,
            scene = lazy_scene(month),
        ),
    };

    if input.has_reference {
        prompt.insert_str(
            0,
            "Use the person in the attached reference photo as the subject, keeping their face and identity recognizable. ",
        );
    }
    prompt
}
