use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::db::repositories::student_repository::parse_timestamp;
use crate::error::AppResult;
use crate::models::progress::{UserProgress, VersionedProgress};

#[derive(Debug, Clone)]
pub struct ProgressRow {
    pub current_smart_threshold: u32,
    pub goals_analyzed: u32,
    pub days_active: u32,
    pub average_smart_score: u32,
    pub last_threshold_increase: String,
    pub start_date: String,
    pub version: i64,
}

impl TryFrom<&Row<'_>> for ProgressRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            current_smart_threshold: row.get("current_smart_threshold")?,
            goals_analyzed: row.get("goals_analyzed")?,
            days_active: row.get("days_active")?,
            average_smart_score: row.get("average_smart_score")?,
            last_threshold_increase: row.get("last_threshold_increase")?,
            start_date: row.get("start_date")?,
            version: row.get("version")?,
        })
    }
}

impl From<ProgressRow> for VersionedProgress {
    fn from(row: ProgressRow) -> Self {
        VersionedProgress {
            progress: UserProgress {
                current_smart_threshold: row.current_smart_threshold,
                goals_analyzed: row.goals_analyzed,
                days_active: row.days_active,
                average_smart_score: row.average_smart_score,
                last_threshold_increase: parse_timestamp(&row.last_threshold_increase),
                start_date: parse_timestamp(&row.start_date),
            },
            version: row.version,
        }
    }
}

pub struct ProgressRepository;

impl ProgressRepository {
    pub fn find(conn: &Connection, student_id: &str) -> AppResult<Option<VersionedProgress>> {
        let mut stmt = conn.prepare(
            "SELECT current_smart_threshold, goals_analyzed, days_active, average_smart_score,
                    last_threshold_increase, start_date, version
             FROM user_progress WHERE student_id = ?1",
        )?;

        let row = stmt
            .query_row([student_id], |row| ProgressRow::try_from(row))
            .optional()?;

        Ok(row.map(VersionedProgress::from))
    }

    /// Creates the first progress row; returns false when another writer got there first.
    pub fn insert_initial(
        conn: &Connection,
        student_id: &str,
        progress: &UserProgress,
    ) -> AppResult<bool> {
        let inserted = conn.execute(
            r#"
                INSERT INTO user_progress (
                    student_id, current_smart_threshold, goals_analyzed, days_active,
                    average_smart_score, last_threshold_increase, start_date, version, updated_at
                ) VALUES (
                    :student_id, :threshold, :goals, :days, :average, :last_increase, :start, 0, :now
                )
                ON CONFLICT(student_id) DO NOTHING
            "#,
            named_params! {
                ":student_id": student_id,
                ":threshold": progress.current_smart_threshold,
                ":goals": progress.goals_analyzed,
                ":days": progress.days_active,
                ":average": progress.average_smart_score,
                ":last_increase": progress.last_threshold_increase.to_rfc3339(),
                ":start": progress.start_date.to_rfc3339(),
                ":now": Utc::now().to_rfc3339(),
            },
        )?;

        Ok(inserted > 0)
    }

    /// Compare-and-swap write; returns false when `expected_version` is stale.
    pub fn update_if_version(
        conn: &Connection,
        student_id: &str,
        progress: &UserProgress,
        expected_version: i64,
    ) -> AppResult<bool> {
        let updated = conn.execute(
            r#"
                UPDATE user_progress SET
                    current_smart_threshold = :threshold,
                    goals_analyzed = :goals,
                    days_active = :days,
                    average_smart_score = :average,
                    last_threshold_increase = :last_increase,
                    start_date = :start,
                    version = version + 1,
                    updated_at = :now
                WHERE student_id = :student_id AND version = :expected_version
            "#,
            named_params! {
                ":threshold": progress.current_smart_threshold,
                ":goals": progress.goals_analyzed,
                ":days": progress.days_active,
                ":average": progress.average_smart_score,
                ":last_increase": progress.last_threshold_increase.to_rfc3339(),
                ":start": progress.start_date.to_rfc3339(),
                ":now": Utc::now().to_rfc3339(),
                ":student_id": student_id,
                ":expected_version": expected_version,
            },
        )?;

        Ok(updated > 0)
    }
}
