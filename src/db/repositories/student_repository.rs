use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::error::AppResult;
use crate::models::badge::BadgeId;
use crate::models::student::StudentRecord;

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub badges_json: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for StudentRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            student_id: row.get("student_id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            badges_json: row.get("badges_json")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl StudentRow {
    pub fn into_record(self) -> StudentRecord {
        let badge_ids = parse_badge_ids(&self.student_id, &self.badges_json);
        StudentRecord {
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            student_id: self.student_id,
            name: self.name,
            email: self.email,
            badge_ids,
        }
    }
}

pub struct StudentRepository;

impl StudentRepository {
    pub fn find(conn: &Connection, student_id: &str) -> AppResult<Option<StudentRecord>> {
        let mut stmt = conn.prepare(
            "SELECT student_id, name, email, badges_json, created_at, updated_at
             FROM students WHERE student_id = ?1",
        )?;

        let row = stmt
            .query_row([student_id], |row| StudentRow::try_from(row))
            .optional()?;

        Ok(row.map(StudentRow::into_record))
    }

    pub fn list(conn: &Connection) -> AppResult<Vec<StudentRecord>> {
        let mut stmt = conn.prepare(
            "SELECT student_id, name, email, badges_json, created_at, updated_at
             FROM students ORDER BY student_id ASC",
        )?;

        let rows = stmt
            .query_map([], |row| StudentRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().map(StudentRow::into_record).collect())
    }

    /// Inserts the student unless present; returns true when a row was created.
    pub fn insert_if_absent(
        conn: &Connection,
        student_id: &str,
        name: &str,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let now = now.to_rfc3339();
        let inserted = conn.execute(
            r#"
                INSERT INTO students (student_id, name, email, badges_json, created_at, updated_at)
                VALUES (:student_id, :name, :email, '[]', :now, :now)
                ON CONFLICT(student_id) DO NOTHING
            "#,
            named_params! {
                ":student_id": student_id,
                ":name": name,
                ":email": email,
                ":now": now,
            },
        )?;

        Ok(inserted > 0)
    }

    pub fn update_badges(
        conn: &Connection,
        student_id: &str,
        badge_ids: &[BadgeId],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let badges_json = serde_json::to_string(badge_ids)?;
        conn.execute(
            "UPDATE students SET badges_json = ?1, updated_at = ?2 WHERE student_id = ?3",
            (badges_json, now.to_rfc3339(), student_id),
        )?;
        Ok(())
    }
}

fn parse_badge_ids(student_id: &str, raw: &str) -> Vec<BadgeId> {
    let values: Vec<String> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(err) => {
            warn!(target: "app::db", %student_id, error = %err, "unreadable badge list, treating as empty");
            return Vec::new();
        }
    };

    values
        .iter()
        .filter_map(|value| {
            let parsed = BadgeId::from_str(value);
            if parsed.is_none() {
                warn!(target: "app::db", %student_id, badge = %value, "dropping unknown badge id");
            }
            parsed
        })
        .collect()
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            warn!(target: "app::db", value = %raw, "invalid timestamp in storage");
            DateTime::<Utc>::UNIX_EPOCH
        })
}
