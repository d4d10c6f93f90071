use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AppResult;
use crate::models::entry::ConfidenceLevel;
use crate::models::quiz::Quiz;
use crate::models::smart::SmartScore;

/// Where an analyzer-backed result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiResponseSource {
    Online,
    Cache,
    Fallback,
}

impl AiResponseSource {
    /// Fallback results are placeholders and must not drive progress.
    pub fn is_provisional(self) -> bool {
        matches!(self, AiResponseSource::Fallback)
    }
}

impl Default for AiResponseSource {
    fn default() -> Self {
        AiResponseSource::Online
    }
}

/// Metadata describing the provider that produced a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AiProviderMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<HashMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<JsonValue>,
}

/// Current connectivity status of the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiStatusDto {
    pub mode: AiResponseSource,
    pub has_api_key: bool,
    pub last_checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AiProviderMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Raw goal verdict as returned by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAnalysisPayload {
    #[serde(flatten)]
    pub score: SmartScore,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AiProviderMetadata>,
}

/// Raw reflection verdict as returned by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionAnalysisPayload {
    pub is_valid: bool,
    pub depth: u8,
    pub confidence_level: String,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAnalysis {
    pub score: SmartScore,
    pub percentage: u32,
    pub feedback: String,
    pub source: AiResponseSource,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AiProviderMetadata>,
}

impl GoalAnalysis {
    pub fn is_provisional(&self) -> bool {
        self.source.is_provisional()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionAnalysis {
    pub is_valid: bool,
    pub depth: u8,
    pub confidence_level: ConfidenceLevel,
    pub feedback: String,
    pub suggestions: Vec<String>,
    pub source: AiResponseSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortSummary {
    pub summary: String,
    pub source: AiResponseSource,
    pub generated_at: DateTime<Utc>,
}

/// Language-model backed analyzer. Implementations map transport and format
/// failures to `AppError::Ai`; callers own the fallback policy.
#[async_trait]
pub trait CoachAiProvider: Send + Sync {
    async fn analyze_goal(&self, goal_text: &str) -> AppResult<GoalAnalysisPayload>;

    async fn analyze_reflection(
        &self,
        reflection_text: &str,
        goal_text: &str,
    ) -> AppResult<ReflectionAnalysisPayload>;

    async fn generate_quiz(&self, goal_text: &str, reflection_text: Option<&str>)
        -> AppResult<Quiz>;

    async fn summarize_cohort(&self, dashboard: &JsonValue) -> AppResult<String>;

    async fn ping(&self) -> AppResult<AiProviderMetadata>;
}
