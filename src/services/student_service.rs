use std::sync::Arc;

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::repositories::entry_repository::EntryRepository;
use crate::db::repositories::progress_repository::ProgressRepository;
use crate::db::repositories::student_repository::StudentRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::badge::BadgeId;
use crate::models::entry::DailyEntry;
use crate::models::progress::UserProgress;
use crate::models::student::{StudentData, StudentRecord};
use crate::services::badge_engine::BadgeEngine;

/// `round(100 * completed / entries)`, 0 with no entries.
pub fn consistency_score(entries: &[DailyEntry]) -> u32 {
    if entries.is_empty() {
        return 0;
    }
    let completed = entries.iter().filter(|entry| entry.goal.completed).count();
    ((completed as f64 * 100.0) / entries.len() as f64).round() as u32
}

/// Consecutive completed days counted back from the newest entry.
///
/// `entries` must be ordered newest first. The count stops at the first
/// incomplete goal or the first gap between calendar dates.
pub fn current_streak(entries: &[DailyEntry]) -> u32 {
    let mut streak = 0;
    let mut previous = None;

    for entry in entries {
        if !entry.goal.completed {
            break;
        }
        if let Some(previous) = previous {
            if entry.entry_date + Duration::days(1) != previous {
                break;
            }
        }
        streak += 1;
        previous = Some(entry.entry_date);
    }

    streak
}

pub struct StudentService {
    db: DbPool,
    badges: Arc<BadgeEngine>,
}

impl StudentService {
    pub fn new(db: DbPool, badges: Arc<BadgeEngine>) -> Self {
        Self { db, badges }
    }

    /// Creates the student on first access; existing records are left untouched.
    pub fn ensure_student(
        &self,
        student_id: &str,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> AppResult<StudentData> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(AppError::validation("student id must not be empty"));
        }

        let name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Student {student_id}"));

        let created = self.db.with_connection(|conn| {
            StudentRepository::insert_if_absent(conn, student_id, &name, email, Utc::now())
        })?;
        if created {
            info!(target: "app::student", %student_id, "student registered");
        }

        self.load(student_id)
    }

    pub fn require(&self, student_id: &str) -> AppResult<StudentRecord> {
        self.db
            .with_connection(|conn| StudentRepository::find(conn, student_id))?
            .ok_or_else(|| AppError::student_not_found(student_id))
    }

    /// Loads a student with derived stats, recomputing and persisting badges.
    pub fn load(&self, student_id: &str) -> AppResult<StudentData> {
        self.db.with_connection(|conn| {
            let record = StudentRepository::find(conn, student_id)?
                .ok_or_else(|| AppError::student_not_found(student_id))?;
            let entries = EntryRepository::list_for_student(conn, student_id)?;
            let progress = ProgressRepository::find(conn, student_id)?.map(|v| v.progress);

            let student = self.assemble(record.clone(), entries, progress);
            self.persist_badges_if_changed(conn, &record, &student)?;
            Ok(student)
        })
    }

    /// Joins a record with its entries and derives consistency, streak and badges.
    pub fn assemble(
        &self,
        record: StudentRecord,
        mut entries: Vec<DailyEntry>,
        progress: Option<UserProgress>,
    ) -> StudentData {
        entries.sort_by(|a, b| b.entry_date.cmp(&a.entry_date));
        let consistency_score = consistency_score(&entries);
        let streak = current_streak(&entries);
        let badges = self.badges.compute(streak, consistency_score, &entries);

        StudentData {
            student_id: record.student_id,
            name: record.name,
            email: record.email,
            consistency_score,
            streak,
            entries,
            badges,
            progress,
        }
    }

    fn persist_badges_if_changed(
        &self,
        conn: &Connection,
        record: &StudentRecord,
        student: &StudentData,
    ) -> AppResult<()> {
        let earned: Vec<BadgeId> = student.badges.iter().map(|badge| badge.id).collect();
        if earned != record.badge_ids {
            StudentRepository::update_badges(conn, &record.student_id, &earned, Utc::now())?;
            debug!(
                target: "app::badges",
                student_id = %record.student_id,
                badges = ?earned,
                "badge list updated"
            );
        }
        Ok(())
    }
}
