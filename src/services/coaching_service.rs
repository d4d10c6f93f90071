use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use lru::LruCache;
use serde::Serialize;
use tokio::task;
use tracing::{debug, info};

use crate::db::repositories::entry_repository::EntryRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::ai_types::{GoalAnalysis, ReflectionAnalysis};
use crate::models::entry::{DailyEntry, DailyEntryPatch, Goal};
use crate::models::progress::ProgressReport;
use crate::models::quiz::{GeneratedQuiz, QuizSubmission};
use crate::models::session::SessionContext;
use crate::models::settings::ProgressUpdatePolicy;
use crate::services::ai_service::AiService;
use crate::services::goal_gate::{self, GateDecision};
use crate::services::progress_tracker::ProgressTracker;
use crate::services::quiz_service;
use crate::services::reflection_gate;
use crate::services::settings_service::SettingsService;
use crate::services::student_service::StudentService;
use crate::utils::calendar::calendar_date;
use crate::utils::redact::describe_text;
use crate::utils::semantic::semantic_hash;

const DEFAULT_QUIZ_TOPIC: &str = "personal development and goal achievement";
const COUNTED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAnalysisOutcome {
    pub analysis: GoalAnalysis,
    pub decision: GateDecision,
    pub progress: Option<ProgressReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSubmissionOutcome {
    pub entry: DailyEntry,
    pub analysis: GoalAnalysis,
    pub decision: GateDecision,
    pub progress: Option<ProgressReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionSubmissionOutcome {
    pub entry: DailyEntry,
    pub analysis: ReflectionAnalysis,
}

/// Goals already folded into progress by an analysis, keyed by student and goal hash,
/// with the threshold that analysis was gated on.
type CountedAnalyses = LruCache<(String, String), u32>;

/// Daily coaching loop for one student: goal, reflection, quiz.
#[derive(Clone)]
pub struct CoachingService {
    db: DbPool,
    ai: Arc<AiService>,
    progress: Arc<ProgressTracker>,
    students: Arc<StudentService>,
    settings: Arc<SettingsService>,
    counted: Arc<Mutex<CountedAnalyses>>,
}

impl CoachingService {
    pub fn new(
        db: DbPool,
        ai: Arc<AiService>,
        progress: Arc<ProgressTracker>,
        students: Arc<StudentService>,
        settings: Arc<SettingsService>,
    ) -> Self {
        let capacity = NonZeroUsize::new(COUNTED_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            db,
            ai,
            progress,
            students,
            settings,
            counted: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Runs database work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(CoachingService) -> AppResult<T> + Send + 'static,
    {
        let this = self.clone();
        task::spawn_blocking(move || work(this))
            .await
            .map_err(|err| AppError::other(format!("coaching task failed: {err}")))?
    }

    fn authorize(&self, session: &SessionContext, student_id: &str) -> AppResult<()> {
        session.ensure_can_access(student_id)?;
        self.students.require(student_id)?;
        Ok(())
    }

    fn today(&self, now: DateTime<Utc>) -> AppResult<NaiveDate> {
        calendar_date(now, &self.settings.get()?.timezone)
    }

    fn todays_entry(&self, student_id: &str, now: DateTime<Utc>) -> AppResult<Option<DailyEntry>> {
        let today = self.today(now)?;
        self.db
            .with_connection(|conn| EntryRepository::find(conn, student_id, today))
    }

    fn counted_key(student_id: &str, goal_text: &str) -> (String, String) {
        (student_id.to_string(), semantic_hash(goal_text, None))
    }

    fn remember_counted(&self, student_id: &str, goal_text: &str, threshold: u32) {
        if let Ok(mut counted) = self.counted.lock() {
            counted.put(Self::counted_key(student_id, goal_text), threshold);
        }
    }

    fn counted_threshold(&self, student_id: &str, goal_text: &str) -> Option<u32> {
        let mut counted = self.counted.lock().ok()?;
        counted.get(&Self::counted_key(student_id, goal_text)).copied()
    }

    fn forget_counted(&self, student_id: &str, goal_text: &str) {
        if let Ok(mut counted) = self.counted.lock() {
            counted.pop(&Self::counted_key(student_id, goal_text));
        }
    }

    /// Scores a goal and gates it against the threshold in force before this analysis.
    /// Under the analysis-time policy the score is then folded into progress.
    pub async fn analyze_goal(
        &self,
        session: &SessionContext,
        student_id: &str,
        goal_text: &str,
        now: DateTime<Utc>,
    ) -> AppResult<GoalAnalysisOutcome> {
        let (session_owned, id) = (session.clone(), student_id.to_string());
        let policy = self
            .blocking(move |this| {
                this.authorize(&session_owned, &id)?;
                Ok(this.settings.get()?.progress_update_policy)
            })
            .await?;

        let analysis = self.ai.analyze_goal(goal_text).await?;
        let counts = policy == ProgressUpdatePolicy::OnAnalysis && !analysis.is_provisional();

        let (id, score) = (student_id.to_string(), analysis.score);
        let (threshold, progress) = self
            .blocking(move |this| {
                let threshold = if counts {
                    this.progress.record(&id, &score, now)?.prior_threshold
                } else {
                    this.progress.current_threshold(&id)?
                };
                Ok((threshold, this.progress.report(&id, now)?))
            })
            .await?;
        if counts {
            self.remember_counted(student_id, goal_text, threshold);
        }

        let decision = goal_gate::evaluate(analysis.percentage, threshold);
        debug!(
            target: "app::gate",
            %student_id,
            percentage = analysis.percentage,
            threshold,
            accepted = decision.accepted,
            source = ?analysis.source,
            "goal analyzed"
        );

        Ok(GoalAnalysisOutcome {
            progress,
            analysis,
            decision,
        })
    }

    /// Gates and stores today's goal. Rejected goals are never persisted.
    ///
    /// Under the analysis-time policy an analysis not yet counted by `analyze_goal` is
    /// counted here. Under the acceptance policy the entry and the progress update
    /// commit in one transaction.
    pub async fn submit_goal(
        &self,
        session: &SessionContext,
        student_id: &str,
        goal_text: &str,
        now: DateTime<Utc>,
    ) -> AppResult<GoalSubmissionOutcome> {
        let (session_owned, id) = (session.clone(), student_id.to_string());
        let (policy, today) = self
            .blocking(move |this| {
                this.authorize(&session_owned, &id)?;
                Ok((this.settings.get()?.progress_update_policy, this.today(now)?))
            })
            .await?;

        let analysis = self.ai.analyze_goal(goal_text).await?;
        let counted = self.counted_threshold(student_id, goal_text);
        let provisional = analysis.is_provisional();
        let (percentage, score) = (analysis.percentage, analysis.score);

        let patch = DailyEntryPatch {
            goal: Some(Goal {
                text: goal_text.trim().to_string(),
                smart_score: Some(analysis.score),
                smart_percentage: Some(analysis.percentage),
                completed: false,
            }),
            ..Default::default()
        };

        let (id, goal) = (student_id.to_string(), goal_text.to_string());
        let (entry, threshold, progress) = self
            .blocking(move |this| {
                let (entry, threshold) = match policy {
                    ProgressUpdatePolicy::OnAnalysis => {
                        let threshold = match counted {
                            Some(threshold) => threshold,
                            None if provisional => this.progress.current_threshold(&id)?,
                            None => {
                                let threshold =
                                    this.progress.record(&id, &score, now)?.prior_threshold;
                                this.remember_counted(&id, &goal, threshold);
                                threshold
                            }
                        };
                        goal_gate::ensure_accepted(percentage, threshold)?;
                        let entry = this.db.with_transaction(|conn| {
                            EntryRepository::merge(conn, &id, today, now, &patch)
                        })?;
                        (entry, threshold)
                    }
                    ProgressUpdatePolicy::OnAcceptance => {
                        let rules = this.progress.rules()?;
                        this.db.with_transaction(|conn| {
                            let threshold = ProgressTracker::threshold_in(conn, &id, &rules)?;
                            goal_gate::ensure_accepted(percentage, threshold)?;
                            let entry = EntryRepository::merge(conn, &id, today, now, &patch)?;
                            if !provisional {
                                ProgressTracker::record_in(conn, &id, &score, now, &rules)?;
                            }
                            Ok((entry, threshold))
                        })?
                    }
                };
                Ok((entry, threshold, this.progress.report(&id, now)?))
            })
            .await?;
        self.forget_counted(student_id, goal_text);

        info!(
            target: "app::gate",
            %student_id,
            date = %today,
            goal = %describe_text(&entry.goal.text),
            percentage,
            threshold,
            "goal stored"
        );

        Ok(GoalSubmissionOutcome {
            entry,
            decision: goal_gate::evaluate(percentage, threshold),
            progress,
            analysis,
        })
    }

    pub async fn submit_reflection(
        &self,
        session: &SessionContext,
        student_id: &str,
        reflection_text: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ReflectionSubmissionOutcome> {
        let (session_owned, id) = (session.clone(), student_id.to_string());
        let text = reflection_text.to_string();
        let entry = self
            .blocking(move |this| {
                this.authorize(&session_owned, &id)?;
                let settings = this.settings.get()?;
                reflection_gate::prefilter(&text, settings.reflection_min_words)?;
                this.todays_entry(&id, now)?.ok_or_else(|| {
                    AppError::validation("set today's goal before writing a reflection")
                })
            })
            .await?;

        let analysis = self
            .ai
            .analyze_reflection(reflection_text, &entry.goal.text)
            .await?;
        let reflection = reflection_gate::validate(reflection_text, &analysis)?;

        let patch = DailyEntryPatch {
            reflection: Some(reflection),
            ..Default::default()
        };
        let id = student_id.to_string();
        let entry = self
            .blocking(move |this| {
                this.db.with_transaction(|conn| {
                    EntryRepository::merge(conn, &id, entry.entry_date, entry.date, &patch)
                })
            })
            .await?;

        info!(
            target: "app::gate",
            %student_id,
            depth = analysis.depth,
            source = ?analysis.source,
            "reflection stored"
        );

        Ok(ReflectionSubmissionOutcome { entry, analysis })
    }

    /// Quiz on today's goal and reflection, or a general topic when there is no goal yet.
    pub async fn generate_quiz(
        &self,
        session: &SessionContext,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<GeneratedQuiz> {
        let (session_owned, id) = (session.clone(), student_id.to_string());
        let entry = self
            .blocking(move |this| {
                this.authorize(&session_owned, &id)?;
                this.todays_entry(&id, now)
            })
            .await?;
        let goal_text = entry
            .as_ref()
            .map(|entry| entry.goal.text.as_str())
            .unwrap_or(DEFAULT_QUIZ_TOPIC);
        let reflection_text = entry
            .as_ref()
            .and_then(|entry| entry.reflection.as_ref())
            .map(|reflection| reflection.text.as_str());

        self.ai.generate_quiz(goal_text, reflection_text).await
    }

    pub fn submit_quiz(
        &self,
        session: &SessionContext,
        student_id: &str,
        submission: &QuizSubmission,
        now: DateTime<Utc>,
    ) -> AppResult<DailyEntry> {
        self.authorize(session, student_id)?;

        let entry = self
            .todays_entry(student_id, now)?
            .ok_or_else(|| AppError::validation("set today's goal before submitting a quiz"))?;
        let evaluation = quiz_service::grade(submission)?;

        debug!(
            target: "app::gate",
            %student_id,
            score = evaluation.score,
            total = evaluation.total,
            "quiz graded"
        );

        let patch = DailyEntryPatch {
            quiz_evaluation: Some(evaluation),
            ..Default::default()
        };
        self.db.with_transaction(|conn| {
            EntryRepository::merge(conn, student_id, entry.entry_date, entry.date, &patch)
        })
    }

    pub fn complete_goal(
        &self,
        session: &SessionContext,
        student_id: &str,
        entry_date: NaiveDate,
        completed: bool,
    ) -> AppResult<DailyEntry> {
        self.authorize(session, student_id)?;

        self.db.with_transaction(|conn| {
            EntryRepository::set_completed(conn, student_id, entry_date, completed)?;
            EntryRepository::find(conn, student_id, entry_date)?.ok_or_else(AppError::not_found)
        })
    }

    pub fn progress_report(
        &self,
        session: &SessionContext,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ProgressReport>> {
        self.authorize(session, student_id)?;
        self.progress.report(student_id, now)
    }
}
