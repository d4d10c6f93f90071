use serde::{Deserialize, Serialize};

/// Word floor for reflections; settings may raise it, never lower it.
pub const REFLECTION_MIN_WORDS: u32 = 50;

/// When a goal analysis feeds the student's adaptive threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressUpdatePolicy {
    OnAnalysis,
    OnAcceptance,
}

impl ProgressUpdatePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressUpdatePolicy::OnAnalysis => "on_analysis",
            ProgressUpdatePolicy::OnAcceptance => "on_acceptance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "on_analysis" => Some(ProgressUpdatePolicy::OnAnalysis),
            "on_acceptance" => Some(ProgressUpdatePolicy::OnAcceptance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachSettings {
    pub initial_smart_threshold: u32,
    pub max_smart_threshold: u32,
    pub threshold_increment: u32,
    pub days_between_increases: i64,
    pub reflection_min_words: u32,
    pub at_risk_missed_goals: u32,
    pub at_risk_min_reflection_depth: f64,
    pub at_risk_min_consistency: u32,
    pub at_risk_limit: u32,
    pub timezone: String,
    pub progress_update_policy: ProgressUpdatePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            initial_smart_threshold: 40,
            max_smart_threshold: 85,
            threshold_increment: 5,
            days_between_increases: 2,
            reflection_min_words: REFLECTION_MIN_WORDS,
            at_risk_missed_goals: 2,
            at_risk_min_reflection_depth: 2.0,
            at_risk_min_consistency: 60,
            at_risk_limit: 5,
            timezone: "UTC".to_string(),
            progress_update_policy: ProgressUpdatePolicy::OnAnalysis,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoachSettingsUpdate {
    pub initial_smart_threshold: Option<u32>,
    pub max_smart_threshold: Option<u32>,
    pub threshold_increment: Option<u32>,
    pub days_between_increases: Option<i64>,
    pub reflection_min_words: Option<u32>,
    pub at_risk_missed_goals: Option<u32>,
    pub at_risk_min_reflection_depth: Option<f64>,
    pub at_risk_min_consistency: Option<u32>,
    pub at_risk_limit: Option<u32>,
    pub timezone: Option<String>,
    pub progress_update_policy: Option<ProgressUpdatePolicy>,
}
