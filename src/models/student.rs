use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::badge::{Badge, BadgeId};
use crate::models::entry::DailyEntry;
use crate::models::progress::UserProgress;

/// Stored student profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub badge_ids: Vec<BadgeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Student profile with derived statistics, entries newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentData {
    pub student_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub consistency_score: u32,
    pub streak: u32,
    pub entries: Vec<DailyEntry>,
    pub badges: Vec<Badge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<UserProgress>,
}
