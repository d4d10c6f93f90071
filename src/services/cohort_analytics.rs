use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::db::repositories::dashboard_repository::DashboardRepository;
use crate::db::repositories::entry_repository::EntryRepository;
use crate::db::repositories::progress_repository::ProgressRepository;
use crate::db::repositories::student_repository::StudentRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::ai_types::CohortSummary;
use crate::models::analytics::{
    AdminDashboardData, AtRiskStudent, CohortKpis, DashboardSnapshot, EngagementPoint,
    StudentListItem,
};
use crate::models::entry::DailyEntry;
use crate::models::session::SessionContext;
use crate::models::settings::CoachSettings;
use crate::models::student::StudentData;
use crate::services::ai_service::AiService;
use crate::services::settings_service::SettingsService;
use crate::services::student_service::StudentService;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtRiskRules {
    pub missed_goals: u32,
    pub min_reflection_depth: f64,
    pub min_consistency: u32,
    pub limit: usize,
}

impl Default for AtRiskRules {
    fn default() -> Self {
        Self {
            missed_goals: 2,
            min_reflection_depth: 2.0,
            min_consistency: 60,
            limit: 5,
        }
    }
}

impl From<&CoachSettings> for AtRiskRules {
    fn from(settings: &CoachSettings) -> Self {
        Self {
            missed_goals: settings.at_risk_missed_goals,
            min_reflection_depth: settings.at_risk_min_reflection_depth,
            min_consistency: settings.at_risk_min_consistency,
            limit: settings.at_risk_limit as usize,
        }
    }
}

/// (label, goal offset, reflection scale, confidence scale) per synthetic week.
const ENGAGEMENT_WEEKS: [(&str, i64, f64, f64); 4] = [
    ("Week 1", 0, 20.0, 0.80),
    ("Week 2", -5, 18.0, 0.75),
    ("Week 3", 3, 22.0, 0.85),
    ("Week 4", 0, 20.0, 0.80),
];

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn mean_depth<'a>(entries: impl Iterator<Item = &'a DailyEntry>) -> Option<f64> {
    mean(entries.filter_map(|entry| entry.reflection.as_ref().map(|r| f64::from(r.depth))))
}

fn mean_quiz_ratio<'a>(entries: impl Iterator<Item = &'a DailyEntry>) -> Option<f64> {
    mean(entries.filter_map(|entry| entry.quiz_evaluation.as_ref().and_then(|q| q.ratio())))
}

pub fn cohort_kpis(entries: &[DailyEntry]) -> CohortKpis {
    let goal_completion = if entries.is_empty() {
        0
    } else {
        let completed = entries.iter().filter(|entry| entry.goal.completed).count();
        ((completed as f64 * 100.0) / entries.len() as f64).round() as u32
    };

    CohortKpis {
        goal_completion,
        avg_reflection_depth: mean_depth(entries.iter()).map(round_to_tenth).unwrap_or(0.0),
        avg_test_performance: mean_quiz_ratio(entries.iter())
            .map(|ratio| (ratio * 100.0).round() as u32)
            .unwrap_or(0),
    }
}

/// Synthetic four-week trend derived from the current KPIs, not a historical series.
pub fn engagement_trend(kpis: &CohortKpis) -> Vec<EngagementPoint> {
    ENGAGEMENT_WEEKS
        .iter()
        .map(|(name, goal_offset, reflection_scale, confidence_scale)| EngagementPoint {
            name: (*name).to_string(),
            goals: (i64::from(kpis.goal_completion) + goal_offset).clamp(0, 100) as u32,
            reflections: (kpis.avg_reflection_depth * reflection_scale).round() as u32,
            confidence: (f64::from(kpis.avg_test_performance) * confidence_scale).round() as u32,
        })
        .collect()
}

/// Flags a student, returning `None` when no rule matches.
pub fn classify_student(
    student: &StudentData,
    entries: &[&DailyEntry],
    rules: &AtRiskRules,
) -> Option<AtRiskStudent> {
    let missed_goals = entries.iter().filter(|entry| !entry.goal.completed).count() as u32;
    let avg_depth = mean_depth(entries.iter().copied()).unwrap_or(0.0);
    let avg_test = mean_quiz_ratio(entries.iter().copied())
        .map(|ratio| (ratio * 100.0).round() as u32)
        .unwrap_or(0);

    let missed = missed_goals > rules.missed_goals;
    let shallow = avg_depth < rules.min_reflection_depth;
    let inconsistent = student.consistency_score < rules.min_consistency;

    let reason = if missed {
        format!("Missed {missed_goals} goals")
    } else if shallow {
        "Low reflection depth".to_string()
    } else if inconsistent {
        "Low consistency score".to_string()
    } else {
        return None;
    };

    Some(AtRiskStudent {
        id: student.student_id.clone(),
        name: student.name.clone(),
        reason,
        missed_goals,
        avg_reflection_depth: round_to_tenth(avg_depth),
        avg_test_score: avg_test,
    })
}

/// Pure cohort aggregation; at-risk students keep the order of `students`.
pub fn aggregate(
    students: &[StudentData],
    entries: &[DailyEntry],
    rules: &AtRiskRules,
) -> AdminDashboardData {
    let kpis = cohort_kpis(entries);

    let mut by_student: HashMap<&str, Vec<&DailyEntry>> = HashMap::new();
    for entry in entries {
        by_student.entry(entry.student_id.as_str()).or_default().push(entry);
    }

    let at_risk_students = students
        .iter()
        .filter_map(|student| {
            let own = by_student
                .get(student.student_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            classify_student(student, own, rules)
        })
        .take(rules.limit)
        .collect();

    AdminDashboardData {
        engagement_data: engagement_trend(&kpis),
        kpis,
        at_risk_students,
        students: students.iter().map(StudentListItem::from).collect(),
    }
}

/// Deterministic administrator summary used when the analyzer is unavailable.
pub fn fallback_summary(data: &AdminDashboardData) -> String {
    let kpis = &data.kpis;
    let mut summary = format!(
        "Goal completion is {}% with an average reflection depth of {:.1} and quiz performance of {}%.",
        kpis.goal_completion, kpis.avg_reflection_depth, kpis.avg_test_performance
    );

    if data.at_risk_students.is_empty() {
        summary.push_str(" No students are currently flagged as at risk.");
    } else {
        let flagged: Vec<String> = data
            .at_risk_students
            .iter()
            .map(|student| format!("{} ({})", student.name, student.reason))
            .collect();
        summary.push_str(&format!(
            " {} student(s) need attention: {}.",
            flagged.len(),
            flagged.join(", ")
        ));
        summary.push_str(" Consider a short check-in with the flagged students this week.");
    }

    summary
}

pub struct CohortAnalyticsService {
    db: DbPool,
    students: Arc<StudentService>,
    settings: Arc<SettingsService>,
    ai: Arc<AiService>,
}

impl CohortAnalyticsService {
    pub fn new(
        db: DbPool,
        students: Arc<StudentService>,
        settings: Arc<SettingsService>,
        ai: Arc<AiService>,
    ) -> Self {
        Self {
            db,
            students,
            settings,
            ai,
        }
    }

    /// Fresh aggregation, falling back to the last stored snapshot when it fails.
    pub fn dashboard(&self, session: &SessionContext) -> AppResult<DashboardSnapshot> {
        session.ensure_admin()?;

        match self.compute_snapshot() {
            Ok(snapshot) => {
                if let Err(err) = self
                    .db
                    .with_connection(|conn| DashboardRepository::insert(conn, &snapshot))
                {
                    warn!(target: "app::cohort", error = %err, "failed to store dashboard snapshot");
                }
                Ok(snapshot)
            }
            Err(err) => {
                warn!(target: "app::cohort", error = %err, "cohort aggregation failed");
                match self.db.with_connection(DashboardRepository::latest) {
                    Ok(Some(mut snapshot)) => {
                        snapshot.stale = true;
                        Ok(snapshot)
                    }
                    _ => Err(err),
                }
            }
        }
    }

    pub fn student_detail(
        &self,
        session: &SessionContext,
        student_id: &str,
    ) -> AppResult<StudentData> {
        session.ensure_admin()?;
        self.students.load(student_id)
    }

    /// Administrator summary of an already aggregated snapshot.
    pub async fn summarize(
        &self,
        session: &SessionContext,
        snapshot: &DashboardSnapshot,
    ) -> AppResult<CohortSummary> {
        session.ensure_admin()?;
        self.ai.summarize_cohort(&snapshot.data).await
    }

    fn compute_snapshot(&self) -> AppResult<DashboardSnapshot> {
        let rules = AtRiskRules::from(&self.settings.get()?);

        let (students, entries) = self.db.with_connection(|conn| {
            let records = StudentRepository::list(conn)?;
            let entries = EntryRepository::list_all(conn)?;

            let mut students = Vec::with_capacity(records.len());
            for record in records {
                let own: Vec<DailyEntry> = entries
                    .iter()
                    .filter(|entry| entry.student_id == record.student_id)
                    .cloned()
                    .collect();
                let progress =
                    ProgressRepository::find(conn, &record.student_id)?.map(|v| v.progress);
                students.push(self.students.assemble(record, own, progress));
            }
            Ok((students, entries))
        })?;

        let data = aggregate(&students, &entries, &rules);
        info!(
            target: "app::cohort",
            students = students.len(),
            entries = entries.len(),
            at_risk = data.at_risk_students.len(),
            "cohort aggregated"
        );

        Ok(DashboardSnapshot {
            data,
            total_students: students.len() as u32,
            total_entries: entries.len() as u32,
            computed_at: Utc::now(),
            stale: false,
        })
    }
}
