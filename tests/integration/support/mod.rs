#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use tempfile::TempDir;

use goal_coach_lib::commands::AppState;
use goal_coach_lib::db::DbPool;
use goal_coach_lib::error::{AiErrorCode, AppError, AppResult};
use goal_coach_lib::models::ai_types::{
    AiProviderMetadata, CoachAiProvider, GoalAnalysisPayload, ReflectionAnalysisPayload,
};
use goal_coach_lib::models::quiz::Quiz;
use goal_coach_lib::models::smart::SmartScore;
use goal_coach_lib::services::ai_service::AiService;

/// Analyzer double with per-goal scores and a swappable reflection verdict.
#[derive(Default)]
pub struct StubAnalyzer {
    goals: Mutex<HashMap<String, SmartScore>>,
    reflection: Mutex<Option<ReflectionAnalysisPayload>>,
    quiz: Mutex<Option<Quiz>>,
    summary: Mutex<Option<String>>,
    pub goal_calls: AtomicUsize,
    pub reflection_calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn score_goal(&self, text: &str, score: SmartScore) {
        self.goals
            .lock()
            .expect("goals lock")
            .insert(text.to_string(), score);
    }

    pub fn answer_reflection(&self, is_valid: bool, depth: u8, confidence: &str) {
        *self.reflection.lock().expect("reflection lock") = Some(ReflectionAnalysisPayload {
            is_valid,
            depth,
            confidence_level: confidence.to_string(),
            feedback: if is_valid {
                "Thoughtful and specific.".to_string()
            } else {
                "This reads like a list of facts.".to_string()
            },
            suggestions: vec!["Explain why the afternoon session slipped.".to_string()],
        });
    }

    pub fn answer_quiz(&self, quiz: Quiz) {
        *self.quiz.lock().expect("quiz lock") = Some(quiz);
    }

    pub fn answer_summary(&self, summary: &str) {
        *self.summary.lock().expect("summary lock") = Some(summary.to_string());
    }

    fn unavailable() -> AppError {
        AppError::ai(AiErrorCode::ProviderUnavailable, "stub analyzer has no answer")
    }
}

#[async_trait]
impl CoachAiProvider for StubAnalyzer {
    async fn analyze_goal(&self, goal_text: &str) -> AppResult<GoalAnalysisPayload> {
        self.goal_calls.fetch_add(1, Ordering::SeqCst);
        let score = self
            .goals
            .lock()
            .expect("goals lock")
            .get(goal_text)
            .copied()
            .ok_or_else(Self::unavailable)?;
        Ok(GoalAnalysisPayload {
            score,
            feedback: format!("Scored {goal_text}"),
            provider: None,
        })
    }

    async fn analyze_reflection(
        &self,
        _reflection_text: &str,
        _goal_text: &str,
    ) -> AppResult<ReflectionAnalysisPayload> {
        self.reflection_calls.fetch_add(1, Ordering::SeqCst);
        self.reflection
            .lock()
            .expect("reflection lock")
            .clone()
            .ok_or_else(Self::unavailable)
    }

    async fn generate_quiz(&self, _goal_text: &str, _reflection: Option<&str>) -> AppResult<Quiz> {
        self.quiz
            .lock()
            .expect("quiz lock")
            .clone()
            .ok_or_else(Self::unavailable)
    }

    async fn summarize_cohort(&self, _dashboard: &JsonValue) -> AppResult<String> {
        self.summary
            .lock()
            .expect("summary lock")
            .clone()
            .ok_or_else(Self::unavailable)
    }

    async fn ping(&self) -> AppResult<AiProviderMetadata> {
        Ok(AiProviderMetadata {
            provider_id: Some("stub".to_string()),
            ..Default::default()
        })
    }
}

pub struct Harness {
    pub state: AppState,
    pub analyzer: Arc<StubAnalyzer>,
    _dir: TempDir,
}

pub fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("coach.sqlite")).expect("db pool");
    let analyzer = Arc::new(StubAnalyzer::default());
    let provider: Arc<dyn CoachAiProvider> = analyzer.clone();
    let ai = Arc::new(AiService::with_provider(pool.clone(), Some(provider)).expect("ai service"));
    let state = AppState::with_ai(pool, ai).expect("app state");

    Harness {
        state,
        analyzer,
        _dir: dir,
    }
}

pub fn register(state: &AppState, student_id: &str, name: &str) {
    state
        .students()
        .ensure_student(student_id, Some(name), None)
        .expect("register student");
}

/// Noon UTC on 2024-03-`day`.
pub fn march(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0)
        .single()
        .expect("valid test date")
}

pub fn words(count: usize) -> String {
    (0..count)
        .map(|index| format!("word{index}"))
        .collect::<Vec<_>>()
        .join(" ")
}
