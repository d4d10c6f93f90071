use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ai_types::AiResponseSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub title: String,
    pub description: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuiz {
    pub quiz: Quiz,
    pub source: AiResponseSource,
    pub generated_at: DateTime<Utc>,
}

/// Chosen options in question order; missing trailing answers count as incorrect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub quiz: Quiz,
    pub answers: Vec<String>,
}
