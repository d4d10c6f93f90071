use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::smart::SmartScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }

    /// Analyzer output is upper-case and occasionally free-form; anything unrecognised is low.
    pub fn parse_loose(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => ConfidenceLevel::High,
            "medium" => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_score: Option<SmartScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_percentage: Option<u32>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub text: String,
    pub depth: u8,
    pub confidence_level: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizEvaluation {
    pub score: u32,
    pub total: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub incorrect_answers: u32,
    pub feedback: String,
}

impl QuizEvaluation {
    /// Fraction of correct answers, or `None` for an empty quiz.
    pub fn ratio(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(f64::from(self.score) / f64::from(self.total))
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.score <= self.total && self.score + self.incorrect_answers == self.total
    }
}

/// One record per student per calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub student_id: String,
    pub entry_date: NaiveDate,
    pub date: DateTime<Utc>,
    pub goal: Goal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_evaluation: Option<QuizEvaluation>,
}

/// Partial update merged into an existing entry; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyEntryPatch {
    pub goal: Option<Goal>,
    pub reflection: Option<Reflection>,
    pub quiz_evaluation: Option<QuizEvaluation>,
}
