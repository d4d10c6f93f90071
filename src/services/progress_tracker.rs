use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::repositories::progress_repository::ProgressRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::progress::{ProgressReport, UserProgress};
use crate::models::settings::CoachSettings;
use crate::models::smart::SmartScore;
use crate::services::settings_service::SettingsService;
use crate::services::smart_score::percentage_of;

const MAX_CAS_ATTEMPTS: usize = 5;
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Escalation parameters for the adaptive SMART threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionRules {
    pub initial_threshold: u32,
    pub max_threshold: u32,
    pub increment: u32,
    pub days_between_increases: i64,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            initial_threshold: 40,
            max_threshold: 85,
            increment: 5,
            days_between_increases: 2,
        }
    }
}

impl From<&CoachSettings> for ProgressionRules {
    fn from(settings: &CoachSettings) -> Self {
        Self {
            initial_threshold: settings.initial_smart_threshold,
            max_threshold: settings.max_smart_threshold,
            increment: settings.threshold_increment,
            days_between_increases: settings.days_between_increases,
        }
    }
}

pub fn initialize_progress(now: DateTime<Utc>, rules: &ProgressionRules) -> UserProgress {
    UserProgress {
        current_smart_threshold: rules.initial_threshold,
        goals_analyzed: 0,
        days_active: 0,
        average_smart_score: 0,
        last_threshold_increase: now,
        start_date: now,
    }
}

/// Whole days elapsed, floored; a clock that runs backwards yields negative days.
pub fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

/// Folds one scored analysis into the running progress.
pub fn record_analysis(
    progress: &UserProgress,
    score: &SmartScore,
    now: DateTime<Utc>,
    rules: &ProgressionRules,
) -> UserProgress {
    let new_percentage = percentage_of(score);
    let goals_analyzed = progress.goals_analyzed + 1;
    let running_total =
        u64::from(progress.average_smart_score) * u64::from(progress.goals_analyzed)
            + u64::from(new_percentage);
    let average_smart_score =
        (running_total as f64 / f64::from(goals_analyzed)).round() as u32;

    let days_active = whole_days_between(progress.start_date, now).max(0) as u32;
    let days_since_increase = whole_days_between(progress.last_threshold_increase, now);

    let mut current_smart_threshold = progress.current_smart_threshold;
    let mut last_threshold_increase = progress.last_threshold_increase;

    if days_since_increase >= rules.days_between_increases
        && current_smart_threshold < rules.max_threshold
        && average_smart_score >= current_smart_threshold
    {
        current_smart_threshold =
            (current_smart_threshold + rules.increment).min(rules.max_threshold);
        last_threshold_increase = now;
    }

    UserProgress {
        current_smart_threshold,
        goals_analyzed,
        days_active,
        average_smart_score,
        last_threshold_increase,
        start_date: progress.start_date,
    }
}

pub fn days_until_next_increase(
    progress: &UserProgress,
    now: DateTime<Utc>,
    rules: &ProgressionRules,
) -> i64 {
    let elapsed = whole_days_between(progress.last_threshold_increase, now);
    (rules.days_between_increases - elapsed).max(0)
}

pub fn progress_message(
    progress: &UserProgress,
    now: DateTime<Utc>,
    rules: &ProgressionRules,
) -> String {
    if progress.current_smart_threshold >= rules.max_threshold {
        return "🏆 You've mastered SMART goal setting!".to_string();
    }

    let days_left = days_until_next_increase(progress, now, rules);
    if days_left == 0 {
        if progress.average_smart_score >= progress.current_smart_threshold {
            let next = (progress.current_smart_threshold + rules.increment).min(rules.max_threshold);
            return format!("🎯 Ready to level up! Threshold will increase to {next}% soon.");
        }
        return format!(
            "📈 Keep improving! Reach an average of {}% to unlock the next level.",
            progress.current_smart_threshold
        );
    }

    let unit = if days_left == 1 { "day" } else { "days" };
    format!("📈 Keep improving! {days_left} {unit} until next level-up opportunity.")
}

/// Stored progress after one analysis, with the threshold that analysis was gated on.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnalysis {
    pub prior_threshold: u32,
    pub progress: UserProgress,
}

/// One compare-and-swap attempt on `conn`; `None` when another writer moved the row.
fn try_record(
    conn: &Connection,
    student_id: &str,
    score: &SmartScore,
    now: DateTime<Utc>,
    rules: &ProgressionRules,
) -> AppResult<Option<RecordedAnalysis>> {
    match ProgressRepository::find(conn, student_id)? {
        Some(current) => {
            let prior_threshold = current.progress.current_smart_threshold;
            let next = record_analysis(&current.progress, score, now, rules);
            let swapped =
                ProgressRepository::update_if_version(conn, student_id, &next, current.version)?;
            if swapped && next.current_smart_threshold != prior_threshold {
                info!(
                    target: "app::progress",
                    %student_id,
                    from = prior_threshold,
                    to = next.current_smart_threshold,
                    "SMART threshold raised"
                );
            }
            Ok(swapped.then_some(RecordedAnalysis {
                prior_threshold,
                progress: next,
            }))
        }
        None => {
            let initial = initialize_progress(now, rules);
            let next = record_analysis(&initial, score, now, rules);
            let inserted = ProgressRepository::insert_initial(conn, student_id, &next)?;
            Ok(inserted.then_some(RecordedAnalysis {
                prior_threshold: initial.current_smart_threshold,
                progress: next,
            }))
        }
    }
}

pub struct ProgressTracker {
    db: DbPool,
    settings: Arc<SettingsService>,
}

impl ProgressTracker {
    pub fn new(db: DbPool, settings: Arc<SettingsService>) -> Self {
        Self { db, settings }
    }

    pub fn rules(&self) -> AppResult<ProgressionRules> {
        Ok(ProgressionRules::from(&self.settings.get()?))
    }

    pub fn get(&self, student_id: &str) -> AppResult<Option<UserProgress>> {
        self.db.with_connection(|conn| {
            Ok(ProgressRepository::find(conn, student_id)?.map(|versioned| versioned.progress))
        })
    }

    /// Threshold a goal must meet right now; the initial threshold before any analysis.
    pub fn current_threshold(&self, student_id: &str) -> AppResult<u32> {
        let rules = self.rules()?;
        self.db
            .with_connection(|conn| Self::threshold_in(conn, student_id, &rules))
    }

    pub fn threshold_in(
        conn: &Connection,
        student_id: &str,
        rules: &ProgressionRules,
    ) -> AppResult<u32> {
        Ok(ProgressRepository::find(conn, student_id)?
            .map(|versioned| versioned.progress.current_smart_threshold)
            .unwrap_or(rules.initial_threshold))
    }

    pub fn report(&self, student_id: &str, now: DateTime<Utc>) -> AppResult<Option<ProgressReport>> {
        let rules = self.rules()?;
        Ok(self.get(student_id)?.map(|progress| ProgressReport {
            message: progress_message(&progress, now, &rules),
            days_until_next_increase: days_until_next_increase(&progress, now, &rules),
            progress,
        }))
    }

    /// Applies one scored analysis with a compare-and-swap on the stored version so
    /// concurrent analyses for the same student never lose an update.
    ///
    /// Blocks between attempts; call it from a blocking task.
    pub fn record(
        &self,
        student_id: &str,
        score: &SmartScore,
        now: DateTime<Utc>,
    ) -> AppResult<RecordedAnalysis> {
        let rules = self.rules()?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let committed = self
                .db
                .with_connection(|conn| try_record(conn, student_id, score, now, &rules))?;

            if let Some(recorded) = committed {
                debug!(
                    target: "app::progress",
                    %student_id,
                    attempt,
                    goals_analyzed = recorded.progress.goals_analyzed,
                    average = recorded.progress.average_smart_score,
                    "progress recorded"
                );
                return Ok(recorded);
            }

            warn!(target: "app::progress", %student_id, attempt, "progress version conflict, retrying");
            std::thread::sleep(std::time::Duration::from_millis(5 * attempt as u64));
        }

        Err(AppError::conflict(format!(
            "progress for {student_id} changed concurrently {MAX_CAS_ATTEMPTS} times"
        )))
    }

    /// Records inside the caller's transaction, so the write commits or rolls back with it.
    pub fn record_in(
        conn: &Connection,
        student_id: &str,
        score: &SmartScore,
        now: DateTime<Utc>,
        rules: &ProgressionRules,
    ) -> AppResult<RecordedAnalysis> {
        try_record(conn, student_id, score, now, rules)?.ok_or_else(|| {
            AppError::conflict(format!("progress for {student_id} changed during the transaction"))
        })
    }
}
