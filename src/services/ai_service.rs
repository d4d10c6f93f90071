use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{AiErrorCode, AppError, AppResult};
use crate::models::ai_types::{
    AiProviderMetadata, AiResponseSource, AiStatusDto, CoachAiProvider, CohortSummary,
    GoalAnalysis, GoalAnalysisPayload, ReflectionAnalysis, ReflectionAnalysisPayload,
};
use crate::models::analytics::AdminDashboardData;
use crate::models::entry::ConfidenceLevel;
use crate::models::quiz::{GeneratedQuiz, Quiz};
use crate::models::smart::SmartScore;
use crate::services::cache_service::CacheService;
use crate::services::cohort_analytics::fallback_summary;
use crate::services::prompt_templates::{
    build_cohort_payload, build_goal_payload, build_quiz_payload, build_reflection_payload,
    cohort_summary_response_schema, cohort_summary_system_prompt, goal_analysis_system_prompt,
    goal_response_schema, quiz_generation_system_prompt, quiz_response_schema,
    reflection_analysis_system_prompt, reflection_response_schema,
};
use crate::services::quiz_service::fallback_quiz;
use crate::services::smart_score::{analysis_from_payload, fallback_analysis};
use crate::utils::redact::{describe_text, redact_student_text};
use crate::utils::semantic::semantic_hash;

const ENV_API_KEY: &str = "GOAL_COACH_LLM_API_KEY";
const ENV_BASE_URL: &str = "GOAL_COACH_LLM_BASE_URL";
const ENV_MODEL: &str = "GOAL_COACH_LLM_MODEL";
const ENV_MAX_RETRIES: &str = "GOAL_COACH_LLM_MAX_RETRIES";

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const BACKOFF_SCHEDULE_SECS: [u64; 4] = [0, 1, 2, 4];

pub const FALLBACK_REFLECTION_FEEDBACK: &str =
    "Analysis temporarily unavailable. Your reflection was accepted with a provisional assessment.";
const FALLBACK_REFLECTION_DEPTH: u8 = 3;

static JSON_OBJECT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").ok());

#[derive(Debug, Clone, PartialEq)]
pub struct AiServiceConfig {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub http_timeout: StdDuration,
    pub cache_ttl: Duration,
    /// Extra attempts after the first for retryable failures; 0 disables retry.
    pub max_retries: usize,
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            http_timeout: StdDuration::from_secs(30),
            cache_ttl: Duration::days(7),
            max_retries: 0,
        }
    }
}

impl AiServiceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = std::env::var(ENV_API_KEY)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let api_base_url = std::env::var(ENV_BASE_URL).unwrap_or(defaults.api_base_url);
        let model = std::env::var(ENV_MODEL).unwrap_or(defaults.model);
        let max_retries = std::env::var(ENV_MAX_RETRIES)
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .map(|value| value.min(BACKOFF_SCHEDULE_SECS.len() - 1))
            .unwrap_or(defaults.max_retries);

        Self {
            api_key,
            api_base_url,
            model,
            max_retries,
            ..defaults
        }
    }

    fn build_provider(&self) -> AppResult<Option<Arc<dyn CoachAiProvider>>> {
        match &self.api_key {
            Some(api_key) => {
                let provider = ChatCompletionsProvider::try_new(self, api_key.clone())?;
                Ok(Some(Arc::new(provider)))
            }
            None => Ok(None),
        }
    }
}

/// Analyzer front door: owns caching and the fallback policy so callers always get a result.
pub struct AiService {
    provider: RwLock<Option<Arc<dyn CoachAiProvider>>>,
    cache: CacheService,
}

impl AiService {
    pub fn new(db: DbPool) -> AppResult<Self> {
        Self::with_config(db, AiServiceConfig::from_env())
    }

    pub fn with_config(db: DbPool, config: AiServiceConfig) -> AppResult<Self> {
        let provider = config.build_provider()?;
        if provider.is_none() {
            info!(target: "app::ai", "no analyzer API key configured, using provisional results");
        }
        Ok(Self {
            provider: RwLock::new(provider),
            cache: CacheService::new(db, config.cache_ttl)?,
        })
    }

    pub fn with_provider(
        db: DbPool,
        provider: Option<Arc<dyn CoachAiProvider>>,
    ) -> AppResult<Self> {
        Ok(Self {
            provider: RwLock::new(provider),
            cache: CacheService::new(db, AiServiceConfig::default().cache_ttl)?,
        })
    }

    pub fn replace_provider(&self, provider: Option<Arc<dyn CoachAiProvider>>) -> AppResult<()> {
        let mut guard = self
            .provider
            .write()
            .map_err(|_| AppError::other("analyzer provider lock poisoned"))?;
        *guard = provider;
        Ok(())
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    fn current_provider(&self) -> AppResult<Option<Arc<dyn CoachAiProvider>>> {
        let guard = self
            .provider
            .read()
            .map_err(|_| AppError::other("analyzer provider lock poisoned"))?;
        Ok(guard.clone())
    }

    /// Scores a goal: cache, then provider, then the neutral fallback.
    pub async fn analyze_goal(&self, goal_text: &str) -> AppResult<GoalAnalysis> {
        let trimmed = goal_text.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("goal text must not be empty"));
        }

        let hash = semantic_hash(trimmed, None);
        match self.cache.get_goal(&hash).await {
            Ok(Some(payload)) => {
                debug!(target: "app::ai", goal = %describe_text(trimmed), "goal analysis served from cache");
                return Ok(analysis_from_payload(payload, AiResponseSource::Cache, Utc::now()));
            }
            Ok(None) => {}
            Err(err) => warn!(target: "app::ai::cache", error = %err, "cache lookup failed"),
        }

        let Some(provider) = self.current_provider()? else {
            return Ok(fallback_analysis(Utc::now()));
        };

        let payload = match provider.analyze_goal(trimmed).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "app::ai", error = %err, "goal analysis failed, using fallback");
                return Ok(fallback_analysis(Utc::now()));
            }
        };

        if let Err(err) = payload.score.validate() {
            warn!(target: "app::ai", error = %err, "analyzer returned out-of-range SMART ratings");
            return Ok(fallback_analysis(Utc::now()));
        }

        if let Err(err) = self.cache.put_goal(&hash, trimmed, &payload).await {
            warn!(target: "app::ai::cache", error = %err, "failed to cache goal analysis");
        }

        Ok(analysis_from_payload(payload, AiResponseSource::Online, Utc::now()))
    }

    pub async fn analyze_reflection(
        &self,
        reflection_text: &str,
        goal_text: &str,
    ) -> AppResult<ReflectionAnalysis> {
        let Some(provider) = self.current_provider()? else {
            return Ok(fallback_reflection());
        };

        match provider.analyze_reflection(reflection_text, goal_text).await {
            Ok(payload) => match reflection_from_payload(payload) {
                Some(analysis) => Ok(analysis),
                None => {
                    warn!(target: "app::ai", "analyzer returned reflection depth outside 1..=5");
                    Ok(fallback_reflection())
                }
            },
            Err(err) => {
                warn!(target: "app::ai", error = %err, "reflection analysis failed, using fallback");
                Ok(fallback_reflection())
            }
        }
    }

    pub async fn generate_quiz(
        &self,
        goal_text: &str,
        reflection_text: Option<&str>,
    ) -> AppResult<GeneratedQuiz> {
        let fallback = || GeneratedQuiz {
            quiz: fallback_quiz(),
            source: AiResponseSource::Fallback,
            generated_at: Utc::now(),
        };

        let Some(provider) = self.current_provider()? else {
            return Ok(fallback());
        };

        match provider.generate_quiz(goal_text, reflection_text).await {
            Ok(quiz) if is_well_formed(&quiz) => Ok(GeneratedQuiz {
                quiz,
                source: AiResponseSource::Online,
                generated_at: Utc::now(),
            }),
            Ok(_) => {
                warn!(target: "app::ai", "generated quiz has answers missing from options");
                Ok(fallback())
            }
            Err(err) => {
                warn!(target: "app::ai", error = %err, "quiz generation failed, using fallback");
                Ok(fallback())
            }
        }
    }

    pub async fn summarize_cohort(&self, data: &AdminDashboardData) -> AppResult<CohortSummary> {
        let fallback = || CohortSummary {
            summary: fallback_summary(data),
            source: AiResponseSource::Fallback,
            generated_at: Utc::now(),
        };

        let Some(provider) = self.current_provider()? else {
            return Ok(fallback());
        };

        match provider.summarize_cohort(&build_cohort_payload(data)).await {
            Ok(summary) if !summary.trim().is_empty() => Ok(CohortSummary {
                summary: summary.trim().to_string(),
                source: AiResponseSource::Online,
                generated_at: Utc::now(),
            }),
            Ok(_) => Ok(fallback()),
            Err(err) => {
                warn!(target: "app::ai", error = %err, "cohort summary failed, using fallback");
                Ok(fallback())
            }
        }
    }

    pub async fn status(&self) -> AppResult<AiStatusDto> {
        let last_checked_at = Utc::now().to_rfc3339();
        let Some(provider) = self.current_provider()? else {
            return Ok(AiStatusDto {
                mode: AiResponseSource::Fallback,
                has_api_key: false,
                last_checked_at,
                latency_ms: None,
                provider: None,
                message: Some("Analyzer API key is not configured".to_string()),
            });
        };

        match provider.ping().await {
            Ok(metadata) => Ok(AiStatusDto {
                mode: AiResponseSource::Online,
                has_api_key: true,
                last_checked_at,
                latency_ms: metadata.latency_ms,
                provider: Some(metadata),
                message: None,
            }),
            Err(err) => {
                warn!(target: "app::ai", error = %err, "analyzer ping failed");
                Ok(AiStatusDto {
                    mode: AiResponseSource::Fallback,
                    has_api_key: true,
                    last_checked_at,
                    latency_ms: None,
                    provider: None,
                    message: Some(err.to_string()),
                })
            }
        }
    }
}

pub fn fallback_reflection() -> ReflectionAnalysis {
    ReflectionAnalysis {
        is_valid: true,
        depth: FALLBACK_REFLECTION_DEPTH,
        confidence_level: ConfidenceLevel::Medium,
        feedback: FALLBACK_REFLECTION_FEEDBACK.to_string(),
        suggestions: Vec::new(),
        source: AiResponseSource::Fallback,
    }
}

fn reflection_from_payload(payload: ReflectionAnalysisPayload) -> Option<ReflectionAnalysis> {
    if !(1..=5).contains(&payload.depth) {
        return None;
    }
    Some(ReflectionAnalysis {
        is_valid: payload.is_valid,
        depth: payload.depth,
        confidence_level: ConfidenceLevel::parse_loose(&payload.confidence_level),
        feedback: payload.feedback,
        suggestions: payload.suggestions,
        source: AiResponseSource::Online,
    })
}

fn is_well_formed(quiz: &Quiz) -> bool {
    !quiz.questions.is_empty()
        && quiz
            .questions
            .iter()
            .all(|question| question.options.contains(&question.correct_answer))
}

/// Chat-completions client for any OpenAI-compatible endpoint.
struct ChatCompletionsProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    endpoint: String,
    model: String,
    max_retries: usize,
}

#[derive(Clone, Copy)]
enum CoachOperation {
    AnalyzeGoal,
    AnalyzeReflection,
    GenerateQuiz,
    SummarizeCohort,
}

impl CoachOperation {
    fn as_str(self) -> &'static str {
        match self {
            CoachOperation::AnalyzeGoal => "analyzeGoal",
            CoachOperation::AnalyzeReflection => "analyzeReflection",
            CoachOperation::GenerateQuiz => "generateQuiz",
            CoachOperation::SummarizeCohort => "summarizeCohort",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            CoachOperation::AnalyzeGoal => goal_analysis_system_prompt(),
            CoachOperation::AnalyzeReflection => reflection_analysis_system_prompt(),
            CoachOperation::GenerateQuiz => quiz_generation_system_prompt(),
            CoachOperation::SummarizeCohort => cohort_summary_system_prompt(),
        }
    }

    fn temperature(self) -> f32 {
        match self {
            CoachOperation::AnalyzeGoal | CoachOperation::AnalyzeReflection => 0.2,
            CoachOperation::GenerateQuiz => 0.7,
            CoachOperation::SummarizeCohort => 0.4,
        }
    }

    fn response_schema(self) -> JsonValue {
        match self {
            CoachOperation::AnalyzeGoal => goal_response_schema(),
            CoachOperation::AnalyzeReflection => reflection_response_schema(),
            CoachOperation::GenerateQuiz => quiz_response_schema(),
            CoachOperation::SummarizeCohort => cohort_summary_response_schema(),
        }
    }
}

struct ChatInvocationResult {
    content: JsonValue,
    tokens_used: HashMap<String, u64>,
    latency_ms: u128,
    correlation_id: String,
}

#[derive(Deserialize)]
struct GoalAnalysisWire {
    score: SmartScore,
    feedback: String,
}

impl ChatCompletionsProvider {
    fn try_new(config: &AiServiceConfig, api_key: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(StdDuration::from_secs(90)))
            .build()
            .map_err(|err| AppError::other(format!("failed to build analyzer HTTP client: {err}")))?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        let endpoint = format!("{base_url}/v1/chat/completions");

        Ok(Self {
            client,
            api_key,
            base_url,
            endpoint,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn invoke_chat(
        &self,
        operation: CoachOperation,
        payload: JsonValue,
    ) -> AppResult<ChatInvocationResult> {
        let correlation_id = Uuid::new_v4().to_string();
        let sanitized_payload = redact_student_text(&payload).to_string();
        let request_body = self.build_request_body(operation, &payload);
        let attempts = (self.max_retries + 1).min(BACKOFF_SCHEDULE_SECS.len());

        let mut last_error: Option<AppError> = None;

        for (attempt, delay) in BACKOFF_SCHEDULE_SECS.iter().take(attempts).enumerate() {
            if *delay > 0 {
                sleep(StdDuration::from_secs(*delay)).await;
            }

            debug!(
                target: "app::ai::provider",
                operation = operation.as_str(),
                attempt = attempt + 1,
                correlation_id = %correlation_id,
                payload = %sanitized_payload,
                "invoking analyzer"
            );

            let start = Instant::now();
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let (error, retryable) = match response {
                Ok(resp) if resp.status().is_success() => {
                    let latency_ms = start.elapsed().as_millis();
                    debug!(
                        target: "app::ai::provider",
                        correlation_id = %correlation_id,
                        latency_ms,
                        "analyzer responded"
                    );

                    let body: JsonValue = resp.json().await.map_err(|err| {
                        AppError::ai_with_details(
                            AiErrorCode::InvalidResponse,
                            "failed to decode analyzer response",
                            Some(correlation_id.as_str()),
                            Some(json!({ "reason": err.to_string() })),
                        )
                    })?;

                    let content = body
                        .pointer("/choices/0/message/content")
                        .and_then(JsonValue::as_str)
                        .ok_or_else(|| {
                            AppError::ai_with_details(
                                AiErrorCode::InvalidResponse,
                                "analyzer response is missing message content",
                                Some(correlation_id.as_str()),
                                Some(json!({ "reason": "missing_message_content" })),
                            )
                        })?;

                    let content = Self::parse_content(content, &correlation_id)?;
                    Self::validate_content(operation, &content, &correlation_id)?;

                    return Ok(ChatInvocationResult {
                        content,
                        tokens_used: Self::extract_tokens(&body),
                        latency_ms,
                        correlation_id,
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let mapped = Self::map_http_error(status, &correlation_id);
                    warn!(
                        target: "app::ai::provider",
                        correlation_id = %correlation_id,
                        status = status.as_u16(),
                        retryable = mapped.1,
                        "analyzer returned non-success status"
                    );
                    mapped
                }
                Err(err) => {
                    let mapped = Self::error_from_reqwest(err, &correlation_id);
                    warn!(
                        target: "app::ai::provider",
                        correlation_id = %correlation_id,
                        retryable = mapped.1,
                        "analyzer request failed"
                    );
                    mapped
                }
            };

            if !retryable || attempt + 1 == attempts {
                return Err(error);
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::ai_with_details(
                AiErrorCode::ProviderUnavailable,
                "analyzer request failed",
                Some(correlation_id.as_str()),
                None,
            )
        }))
    }

    fn build_request_body(&self, operation: CoachOperation, payload: &JsonValue) -> JsonValue {
        json!({
            "model": self.model,
            "temperature": operation.temperature(),
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": operation.system_prompt() },
                { "role": "user", "content": payload.to_string() }
            ]
        })
    }

    /// Accepts bare JSON, fenced JSON, or a JSON object embedded in prose.
    fn parse_content(content: &str, correlation_id: &str) -> AppResult<JsonValue> {
        let trimmed = content.trim();
        let cleaned = if trimmed.starts_with("```") {
            trimmed
                .trim_start_matches("```json")
                .trim_start_matches("```JSON")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim()
        } else {
            trimmed
        };

        if let Ok(value) = serde_json::from_str::<JsonValue>(cleaned) {
            return Ok(value);
        }

        JSON_OBJECT
            .as_ref()
            .and_then(|pattern| pattern.find(cleaned))
            .and_then(|found| serde_json::from_str::<JsonValue>(found.as_str()).ok())
            .ok_or_else(|| {
                AppError::ai_with_details(
                    AiErrorCode::InvalidResponse,
                    "analyzer content is not JSON",
                    Some(correlation_id),
                    Some(json!({ "reason": "invalid_json" })),
                )
            })
    }

    fn validate_content(
        operation: CoachOperation,
        content: &JsonValue,
        correlation_id: &str,
    ) -> AppResult<()> {
        let schema_value = operation.response_schema();
        let schema = jsonschema::JSONSchema::compile(&schema_value).map_err(|err| {
            AppError::other(format!(
                "invalid response schema for {}: {err}",
                operation.as_str()
            ))
        })?;

        if let Err(errors) = schema.validate(content) {
            let messages: Vec<String> = errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    let path = if path.is_empty() { "root".to_string() } else { path };
                    format!("{path}: {err}")
                })
                .collect();

            return Err(AppError::ai_with_details(
                AiErrorCode::InvalidResponse,
                format!("analyzer response for {} failed validation", operation.as_str()),
                Some(correlation_id),
                Some(json!({ "errors": messages })),
            ));
        }

        Ok(())
    }

    fn extract_tokens(body: &JsonValue) -> HashMap<String, u64> {
        let mut tokens = HashMap::new();
        if let Some(usage) = body.get("usage") {
            for (field, key) in [
                ("prompt_tokens", "prompt"),
                ("completion_tokens", "completion"),
                ("total_tokens", "total"),
            ] {
                if let Some(value) = usage.get(field).and_then(JsonValue::as_u64) {
                    tokens.insert(key.to_string(), value);
                }
            }
        }
        tokens
    }

    fn build_provider_metadata(
        &self,
        tokens_used: HashMap<String, u64>,
        latency_ms: u128,
        correlation_id: &str,
    ) -> AiProviderMetadata {
        AiProviderMetadata {
            provider_id: Some("openai-compatible".to_string()),
            model: Some(self.model.clone()),
            latency_ms: Some(latency_ms),
            tokens_used: (!tokens_used.is_empty()).then_some(tokens_used),
            extra: Some(json!({ "correlationId": correlation_id })),
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(
        operation: CoachOperation,
        content: JsonValue,
        correlation_id: &str,
    ) -> AppResult<T> {
        serde_json::from_value(content).map_err(|err| {
            AppError::ai_with_details(
                AiErrorCode::InvalidResponse,
                format!("failed to decode {} response: {err}", operation.as_str()),
                Some(correlation_id),
                None,
            )
        })
    }

    fn map_http_error(status: StatusCode, correlation_id: &str) -> (AppError, bool) {
        let (code, message, retryable) = match status {
            StatusCode::UNAUTHORIZED => (
                AiErrorCode::MissingApiKey,
                "analyzer API key is invalid or unauthorized".to_string(),
                false,
            ),
            StatusCode::FORBIDDEN => (
                AiErrorCode::Forbidden,
                "analyzer API access is forbidden".to_string(),
                false,
            ),
            StatusCode::TOO_MANY_REQUESTS => (
                AiErrorCode::RateLimited,
                "analyzer rate limit reached, try again later".to_string(),
                true,
            ),
            status if status.is_server_error() => (
                AiErrorCode::ProviderUnavailable,
                format!("analyzer temporarily unavailable (status {})", status.as_u16()),
                true,
            ),
            StatusCode::BAD_REQUEST => (
                AiErrorCode::InvalidRequest,
                "analyzer rejected the request format".to_string(),
                false,
            ),
            StatusCode::NOT_FOUND => (
                AiErrorCode::InvalidRequest,
                "analyzer endpoint not found".to_string(),
                false,
            ),
            status => (
                AiErrorCode::Unknown,
                format!("analyzer returned status {}", status.as_u16()),
                false,
            ),
        };

        (
            AppError::ai_with_details(code, message, Some(correlation_id), None),
            retryable,
        )
    }

    fn error_from_reqwest(err: reqwest::Error, correlation_id: &str) -> (AppError, bool) {
        if err.is_timeout() {
            (
                AppError::ai_with_details(
                    AiErrorCode::HttpTimeout,
                    "analyzer request timed out",
                    Some(correlation_id),
                    None,
                ),
                true,
            )
        } else if err.is_connect() {
            (
                AppError::ai_with_details(
                    AiErrorCode::ProviderUnavailable,
                    "could not connect to analyzer",
                    Some(correlation_id),
                    None,
                ),
                true,
            )
        } else if let Some(status) = err.status() {
            Self::map_http_error(status, correlation_id)
        } else {
            (
                AppError::ai_with_details(
                    AiErrorCode::Unknown,
                    format!("analyzer request failed: {err}"),
                    Some(correlation_id),
                    None,
                ),
                false,
            )
        }
    }
}

#[async_trait]
impl CoachAiProvider for ChatCompletionsProvider {
    async fn analyze_goal(&self, goal_text: &str) -> AppResult<GoalAnalysisPayload> {
        let operation = CoachOperation::AnalyzeGoal;
        let ChatInvocationResult {
            content,
            tokens_used,
            latency_ms,
            correlation_id,
        } = self
            .invoke_chat(operation, build_goal_payload(goal_text))
            .await?;

        let wire: GoalAnalysisWire = Self::decode(operation, content, &correlation_id)?;
        Ok(GoalAnalysisPayload {
            score: wire.score,
            feedback: wire.feedback,
            provider: Some(self.build_provider_metadata(tokens_used, latency_ms, &correlation_id)),
        })
    }

    async fn analyze_reflection(
        &self,
        reflection_text: &str,
        goal_text: &str,
    ) -> AppResult<ReflectionAnalysisPayload> {
        let operation = CoachOperation::AnalyzeReflection;
        let result = self
            .invoke_chat(operation, build_reflection_payload(reflection_text, goal_text))
            .await?;
        Self::decode(operation, result.content, &result.correlation_id)
    }

    async fn generate_quiz(
        &self,
        goal_text: &str,
        reflection_text: Option<&str>,
    ) -> AppResult<Quiz> {
        let operation = CoachOperation::GenerateQuiz;
        let result = self
            .invoke_chat(operation, build_quiz_payload(goal_text, reflection_text))
            .await?;
        Self::decode(operation, result.content, &result.correlation_id)
    }

    async fn summarize_cohort(&self, dashboard: &JsonValue) -> AppResult<String> {
        let result = self
            .invoke_chat(CoachOperation::SummarizeCohort, dashboard.clone())
            .await?;
        Ok(result
            .content
            .get("summary")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn ping(&self) -> AppResult<AiProviderMetadata> {
        let url = format!("{}/v1/models", self.base_url);
        let correlation_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) if resp.status().is_success() => Ok(self.build_provider_metadata(
                HashMap::new(),
                start.elapsed().as_millis(),
                &correlation_id,
            )),
            Ok(resp) => {
                let status = resp.status();
                warn!(
                    target: "app::ai::provider",
                    correlation_id = %correlation_id,
                    status = status.as_u16(),
                    "analyzer ping returned non-success status"
                );
                Err(Self::map_http_error(status, &correlation_id).0)
            }
            Err(err) => {
                warn!(target: "app::ai::provider", correlation_id = %correlation_id, "analyzer ping failed");
                Err(Self::error_from_reqwest(err, &correlation_id).0)
            }
        }
    }
}

/// Provider internals exposed for integration tests.
pub mod testing {
    use super::*;

    pub fn map_http_error(status: StatusCode) -> (AppError, bool) {
        ChatCompletionsProvider::map_http_error(status, "test-correlation-id")
    }

    pub fn parse_content(content: &str) -> AppResult<JsonValue> {
        ChatCompletionsProvider::parse_content(content, "test-correlation-id")
    }

    pub fn config_for(base_url: &str, timeout: StdDuration, max_retries: usize) -> AiServiceConfig {
        AiServiceConfig {
            api_key: Some("test-key".to_string()),
            api_base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            http_timeout: timeout,
            cache_ttl: Duration::minutes(5),
            max_retries,
        }
    }

    pub async fn analyze_goal_via_http(
        base_url: &str,
        timeout: StdDuration,
        goal_text: &str,
    ) -> AppResult<GoalAnalysisPayload> {
        let config = config_for(base_url, timeout, 0);
        let provider = ChatCompletionsProvider::try_new(&config, "test-key".to_string())?;
        provider.analyze_goal(goal_text).await
    }

    pub async fn analyze_reflection_via_http(
        base_url: &str,
        timeout: StdDuration,
        reflection_text: &str,
        goal_text: &str,
    ) -> AppResult<ReflectionAnalysisPayload> {
        let config = config_for(base_url, timeout, 0);
        let provider = ChatCompletionsProvider::try_new(&config, "test-key".to_string())?;
        provider.analyze_reflection(reflection_text, goal_text).await
    }
}
