use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub accepted: bool,
    pub percentage: u32,
    pub threshold: u32,
    pub message: String,
}

pub fn can_accept(percentage: u32, threshold: u32) -> bool {
    percentage >= threshold
}

pub fn evaluate(percentage: u32, threshold: u32) -> GateDecision {
    let accepted = can_accept(percentage, threshold);
    let message = if accepted {
        format!("Goal accepted: {percentage}% meets the {threshold}% requirement.")
    } else {
        format!("Goal quality too low! Your score: {percentage}%. Required: {threshold}%.")
    };

    GateDecision {
        accepted,
        percentage,
        threshold,
        message,
    }
}

pub fn ensure_accepted(percentage: u32, threshold: u32) -> AppResult<()> {
    if can_accept(percentage, threshold) {
        Ok(())
    } else {
        Err(AppError::goal_below_threshold(percentage, threshold))
    }
}
