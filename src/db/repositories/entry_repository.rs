use std::convert::TryFrom;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::db::repositories::student_repository::parse_timestamp;
use crate::error::{AppError, AppResult};
use crate::models::entry::{
    ConfidenceLevel, DailyEntry, DailyEntryPatch, Goal, QuizEvaluation, Reflection,
};
use crate::models::smart::SmartScore;

const ENTRY_COLUMNS: &str = "student_id, entry_date, recorded_at, goal_text, smart_score_json, \
     smart_percentage, goal_completed, reflection_text, reflection_depth, reflection_confidence, quiz_json";

#[derive(Debug, Clone)]
pub struct DailyEntryRow {
    pub student_id: String,
    pub entry_date: String,
    pub recorded_at: String,
    pub goal_text: String,
    pub smart_score_json: Option<String>,
    pub smart_percentage: Option<u32>,
    pub goal_completed: bool,
    pub reflection_text: Option<String>,
    pub reflection_depth: Option<u8>,
    pub reflection_confidence: Option<String>,
    pub quiz_json: Option<String>,
}

impl TryFrom<&Row<'_>> for DailyEntryRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            student_id: row.get("student_id")?,
            entry_date: row.get("entry_date")?,
            recorded_at: row.get("recorded_at")?,
            goal_text: row.get("goal_text")?,
            smart_score_json: row.get("smart_score_json")?,
            smart_percentage: row.get("smart_percentage")?,
            goal_completed: row.get("goal_completed")?,
            reflection_text: row.get("reflection_text")?,
            reflection_depth: row.get("reflection_depth")?,
            reflection_confidence: row.get("reflection_confidence")?,
            quiz_json: row.get("quiz_json")?,
        })
    }
}

impl TryFrom<DailyEntryRow> for DailyEntry {
    type Error = AppError;

    fn try_from(row: DailyEntryRow) -> Result<Self, Self::Error> {
        let entry_date = NaiveDate::parse_from_str(&row.entry_date, "%Y-%m-%d").map_err(|err| {
            AppError::database(format!("invalid entry_date {}: {err}", row.entry_date))
        })?;

        let smart_score = row
            .smart_score_json
            .as_deref()
            .map(serde_json::from_str::<SmartScore>)
            .transpose()?;

        let reflection = match (row.reflection_text, row.reflection_depth) {
            (Some(text), Some(depth)) => Some(Reflection {
                text,
                depth,
                confidence_level: row
                    .reflection_confidence
                    .as_deref()
                    .map(ConfidenceLevel::parse_loose)
                    .unwrap_or(ConfidenceLevel::Low),
            }),
            _ => None,
        };

        let quiz_evaluation = row
            .quiz_json
            .as_deref()
            .map(serde_json::from_str::<QuizEvaluation>)
            .transpose()?;

        Ok(DailyEntry {
            date: parse_timestamp(&row.recorded_at),
            student_id: row.student_id,
            entry_date,
            goal: Goal {
                text: row.goal_text,
                smart_score,
                smart_percentage: row.smart_percentage,
                completed: row.goal_completed,
            },
            reflection,
            quiz_evaluation,
        })
    }
}

pub struct EntryRepository;

impl EntryRepository {
    pub fn find(
        conn: &Connection,
        student_id: &str,
        entry_date: NaiveDate,
    ) -> AppResult<Option<DailyEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM daily_entries WHERE student_id = ?1 AND entry_date = ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let row = stmt
            .query_row((student_id, date_key(entry_date)), |row| {
                DailyEntryRow::try_from(row)
            })
            .optional()?;

        row.map(DailyEntry::try_from).transpose()
    }

    /// Entries for one student, newest calendar date first.
    pub fn list_for_student(conn: &Connection, student_id: &str) -> AppResult<Vec<DailyEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM daily_entries WHERE student_id = ?1 ORDER BY entry_date DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([student_id], |row| DailyEntryRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(DailyEntry::try_from).collect()
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<DailyEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM daily_entries ORDER BY student_id ASC, entry_date DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| DailyEntryRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(DailyEntry::try_from).collect()
    }

    /// Merges `patch` into the entry for `(student_id, entry_date)`.
    ///
    /// A patch carrying a goal creates the entry or replaces its goal while keeping any
    /// stored reflection and quiz. A patch without a goal requires the entry to exist.
    pub fn merge(
        conn: &Connection,
        student_id: &str,
        entry_date: NaiveDate,
        recorded_at: DateTime<Utc>,
        patch: &DailyEntryPatch,
    ) -> AppResult<DailyEntry> {
        let smart_score_json = patch
            .goal
            .as_ref()
            .and_then(|goal| goal.smart_score.as_ref())
            .map(serde_json::to_string)
            .transpose()?;
        let quiz_json = patch
            .quiz_evaluation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let reflection = patch.reflection.as_ref();
        let now = Utc::now().to_rfc3339();

        match patch.goal.as_ref() {
            Some(goal) => {
                conn.execute(
                    r#"
                    INSERT INTO daily_entries (
                        student_id, entry_date, recorded_at, goal_text, smart_score_json,
                        smart_percentage, goal_completed, reflection_text, reflection_depth,
                        reflection_confidence, quiz_json, updated_at
                    ) VALUES (
                        :student_id, :entry_date, :recorded_at, :goal_text, :smart_score_json,
                        :smart_percentage, :goal_completed, :reflection_text, :reflection_depth,
                        :reflection_confidence, :quiz_json, :now
                    )
                    ON CONFLICT(student_id, entry_date) DO UPDATE SET
                        recorded_at = excluded.recorded_at,
                        goal_text = excluded.goal_text,
                        smart_score_json = excluded.smart_score_json,
                        smart_percentage = excluded.smart_percentage,
                        goal_completed = excluded.goal_completed,
                        reflection_text = COALESCE(excluded.reflection_text, daily_entries.reflection_text),
                        reflection_depth = COALESCE(excluded.reflection_depth, daily_entries.reflection_depth),
                        reflection_confidence = COALESCE(excluded.reflection_confidence, daily_entries.reflection_confidence),
                        quiz_json = COALESCE(excluded.quiz_json, daily_entries.quiz_json),
                        updated_at = excluded.updated_at
                    "#,
                    named_params! {
                        ":student_id": student_id,
                        ":entry_date": date_key(entry_date),
                        ":recorded_at": recorded_at.to_rfc3339(),
                        ":goal_text": goal.text,
                        ":smart_score_json": smart_score_json,
                        ":smart_percentage": goal.smart_percentage,
                        ":goal_completed": goal.completed,
                        ":reflection_text": reflection.map(|r| r.text.as_str()),
                        ":reflection_depth": reflection.map(|r| r.depth),
                        ":reflection_confidence": reflection.map(|r| r.confidence_level.as_str()),
                        ":quiz_json": quiz_json,
                        ":now": now,
                    },
                )?;
            }
            None => {
                let updated = conn.execute(
                    r#"
                    UPDATE daily_entries SET
                        reflection_text = COALESCE(:reflection_text, reflection_text),
                        reflection_depth = COALESCE(:reflection_depth, reflection_depth),
                        reflection_confidence = COALESCE(:reflection_confidence, reflection_confidence),
                        quiz_json = COALESCE(:quiz_json, quiz_json),
                        updated_at = :now
                    WHERE student_id = :student_id AND entry_date = :entry_date
                    "#,
                    named_params! {
                        ":reflection_text": reflection.map(|r| r.text.as_str()),
                        ":reflection_depth": reflection.map(|r| r.depth),
                        ":reflection_confidence": reflection.map(|r| r.confidence_level.as_str()),
                        ":quiz_json": quiz_json,
                        ":now": now,
                        ":student_id": student_id,
                        ":entry_date": date_key(entry_date),
                    },
                )?;

                if updated == 0 {
                    warn!(target: "app::db", %student_id, %entry_date, "merge target entry missing");
                    return Err(AppError::not_found());
                }
            }
        }

        Self::find(conn, student_id, entry_date)?.ok_or_else(AppError::not_found)
    }

    pub fn set_completed(
        conn: &Connection,
        student_id: &str,
        entry_date: NaiveDate,
        completed: bool,
    ) -> AppResult<()> {
        let updated = conn.execute(
            "UPDATE daily_entries SET goal_completed = ?1, updated_at = ?2
             WHERE student_id = ?3 AND entry_date = ?4",
            (
                completed,
                Utc::now().to_rfc3339(),
                student_id,
                date_key(entry_date),
            ),
        )?;

        if updated == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
