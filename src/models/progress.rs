use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-student adaptive difficulty state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub current_smart_threshold: u32,
    pub goals_analyzed: u32,
    pub days_active: u32,
    pub average_smart_score: u32,
    pub last_threshold_increase: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
}

/// Progress row plus the optimistic-concurrency version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedProgress {
    pub progress: UserProgress,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub progress: UserProgress,
    pub message: String,
    pub days_until_next_increase: i64,
}
