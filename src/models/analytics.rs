use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::student::StudentData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortKpis {
    pub goal_completion: u32,
    pub avg_reflection_depth: f64,
    pub avg_test_performance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskStudent {
    pub id: String,
    pub name: String,
    pub reason: String,
    pub missed_goals: u32,
    pub avg_reflection_depth: f64,
    pub avg_test_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementPoint {
    pub name: String,
    pub goals: u32,
    pub reflections: u32,
    pub confidence: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&StudentData> for StudentListItem {
    fn from(student: &StudentData) -> Self {
        Self {
            id: student.student_id.clone(),
            name: student.name.clone(),
            email: student.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboardData {
    pub kpis: CohortKpis,
    pub at_risk_students: Vec<AtRiskStudent>,
    pub students: Vec<StudentListItem>,
    pub engagement_data: Vec<EngagementPoint>,
}

/// Persisted aggregation result, served when a fresh aggregation fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub data: AdminDashboardData,
    pub total_students: u32,
    pub total_entries: u32,
    pub computed_at: DateTime<Utc>,
    #[serde(default)]
    pub stale: bool,
}
