pub mod admin;
pub mod goal;
pub mod quiz;
pub mod reflection;
pub mod settings;
pub mod student;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tokio::task;
use tracing::{error, warn};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::ai_service::AiService;
use crate::services::badge_engine::BadgeEngine;
use crate::services::coaching_service::CoachingService;
use crate::services::cohort_analytics::CohortAnalyticsService;
use crate::services::progress_tracker::ProgressTracker;
use crate::services::settings_service::SettingsService;
use crate::services::student_service::StudentService;

/// Shared services handed to every command.
#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    ai_service: Arc<AiService>,
    settings_service: Arc<SettingsService>,
    student_service: Arc<StudentService>,
    progress_tracker: Arc<ProgressTracker>,
    coaching_service: Arc<CoachingService>,
    cohort_service: Arc<CohortAnalyticsService>,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> AppResult<Self> {
        let ai_service = Arc::new(AiService::new(db_pool.clone())?);
        Self::with_ai(db_pool, ai_service)
    }

    /// Wires the services around an already-built analyzer service.
    pub fn with_ai(db_pool: DbPool, ai_service: Arc<AiService>) -> AppResult<Self> {
        let settings_service = Arc::new(SettingsService::new(db_pool.clone())?);
        let badge_engine = Arc::new(BadgeEngine::new());
        let student_service = Arc::new(StudentService::new(db_pool.clone(), badge_engine));
        let progress_tracker = Arc::new(ProgressTracker::new(
            db_pool.clone(),
            Arc::clone(&settings_service),
        ));
        let coaching_service = Arc::new(CoachingService::new(
            db_pool.clone(),
            Arc::clone(&ai_service),
            Arc::clone(&progress_tracker),
            Arc::clone(&student_service),
            Arc::clone(&settings_service),
        ));
        let cohort_service = Arc::new(CohortAnalyticsService::new(
            db_pool.clone(),
            Arc::clone(&student_service),
            Arc::clone(&settings_service),
            Arc::clone(&ai_service),
        ));

        Ok(Self {
            db_pool,
            ai_service,
            settings_service,
            student_service,
            progress_tracker,
            coaching_service,
            cohort_service,
        })
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }

    pub fn ai(&self) -> Arc<AiService> {
        Arc::clone(&self.ai_service)
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings_service)
    }

    pub fn students(&self) -> Arc<StudentService> {
        Arc::clone(&self.student_service)
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress_tracker)
    }

    pub fn coaching(&self) -> Arc<CoachingService> {
        Arc::clone(&self.coaching_service)
    }

    pub fn cohort(&self) -> Arc<CohortAnalyticsService> {
        Arc::clone(&self.cohort_service)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        let message = error.to_string();
        match error {
            AppError::Validation { message, details, .. } => {
                CommandError::new("VALIDATION_ERROR", message, details)
            }
            AppError::NotFound => CommandError::new("NOT_FOUND", "requested record does not exist", None),
            AppError::StudentNotFound { student_id } => CommandError::new(
                "STUDENT_NOT_FOUND",
                message,
                Some(json!({ "studentId": student_id })),
            ),
            AppError::Conflict { message } => CommandError::new("CONFLICT", message, None),
            AppError::GoalBelowThreshold {
                percentage,
                threshold,
            } => CommandError::new(
                "GOAL_BELOW_THRESHOLD",
                message,
                Some(json!({ "percentage": percentage, "threshold": threshold })),
            ),
            AppError::ReflectionInvalid {
                feedback,
                suggestions,
            } => CommandError::new(
                "REFLECTION_INVALID",
                feedback,
                Some(json!({ "suggestions": suggestions })),
            ),
            AppError::Forbidden { message } => {
                warn!(target: "app::command", %message, "forbidden command");
                CommandError::new("FORBIDDEN", message, None)
            }
            AppError::Ai {
                code,
                message,
                correlation_id,
                details,
            } => {
                let mut merged = JsonMap::new();
                match details {
                    Some(JsonValue::Object(map)) => merged.extend(map),
                    Some(value) => {
                        merged.insert("info".to_string(), value);
                    }
                    None => {}
                }
                if let Some(id) = correlation_id {
                    merged.insert("correlationId".to_string(), JsonValue::String(id));
                }
                let details = (!merged.is_empty()).then_some(JsonValue::Object(merged));
                CommandError::new(code.as_str(), message, details)
            }
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "serialization failed", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "file system access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

/// Runs synchronous service work off the async executor.
pub(crate) async fn run_blocking<T: Send + 'static>(
    work: impl FnOnce() -> AppResult<T> + Send + 'static,
) -> CommandResult<T> {
    task::spawn_blocking(work)
        .await
        .map_err(|err| CommandError::new("UNKNOWN", format!("command task failed: {err}"), None))?
        .map_err(CommandError::from)
}
