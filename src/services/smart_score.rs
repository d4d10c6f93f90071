use chrono::{DateTime, Utc};

use crate::models::ai_types::{AiResponseSource, GoalAnalysis, GoalAnalysisPayload};
use crate::models::smart::{SmartScore, SMART_MAX_RATING};

pub const FALLBACK_RATING: u8 = 3;
pub const FALLBACK_GOAL_FEEDBACK: &str =
    "Analysis temporarily unavailable. Please refine your goal and try again.";

const CRITERIA: u32 = 5;

/// Overall goal quality in 0..=100: `round(sum / 25 * 100)`.
pub fn percentage_of(score: &SmartScore) -> u32 {
    let max_total = CRITERIA * u32::from(SMART_MAX_RATING);
    // sum * 100 / 25 is exact, rounding is a no-op for 1..=5 ratings.
    (score.sum() * 100 + max_total / 2) / max_total
}

pub fn fallback_score() -> SmartScore {
    SmartScore::uniform(FALLBACK_RATING)
}

/// Neutral provisional result used whenever the analyzer cannot answer.
pub fn fallback_analysis(now: DateTime<Utc>) -> GoalAnalysis {
    let score = fallback_score();
    GoalAnalysis {
        percentage: percentage_of(&score),
        score,
        feedback: FALLBACK_GOAL_FEEDBACK.to_string(),
        source: AiResponseSource::Fallback,
        analyzed_at: now,
        provider: None,
    }
}

pub fn analysis_from_payload(
    payload: GoalAnalysisPayload,
    source: AiResponseSource,
    now: DateTime<Utc>,
) -> GoalAnalysis {
    GoalAnalysis {
        percentage: percentage_of(&payload.score),
        score: payload.score,
        feedback: payload.feedback,
        source,
        analyzed_at: now,
        provider: payload.provider,
    }
}
