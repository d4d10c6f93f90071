use std::convert::TryFrom;

use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::repositories::student_repository::parse_timestamp;
use crate::error::AppResult;
use crate::models::analytics::DashboardSnapshot;

const SNAPSHOT_RETENTION: i64 = 30;

#[derive(Debug, Clone)]
pub struct DashboardSnapshotRow {
    pub payload_json: String,
    pub total_students: u32,
    pub total_entries: u32,
    pub computed_at: String,
}

impl TryFrom<&Row<'_>> for DashboardSnapshotRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            payload_json: row.get("payload_json")?,
            total_students: row.get("total_students")?,
            total_entries: row.get("total_entries")?,
            computed_at: row.get("computed_at")?,
        })
    }
}

pub struct DashboardRepository;

impl DashboardRepository {
    pub fn insert(conn: &Connection, snapshot: &DashboardSnapshot) -> AppResult<()> {
        let payload_json = serde_json::to_string(&snapshot.data)?;
        conn.execute(
            "INSERT INTO dashboard_snapshots (payload_json, total_students, total_entries, computed_at)
             VALUES (?1, ?2, ?3, ?4)",
            (
                payload_json,
                snapshot.total_students,
                snapshot.total_entries,
                snapshot.computed_at.to_rfc3339(),
            ),
        )?;

        conn.execute(
            "DELETE FROM dashboard_snapshots WHERE id NOT IN (
                SELECT id FROM dashboard_snapshots ORDER BY id DESC LIMIT ?1
            )",
            [SNAPSHOT_RETENTION],
        )?;

        Ok(())
    }

    pub fn latest(conn: &Connection) -> AppResult<Option<DashboardSnapshot>> {
        let mut stmt = conn.prepare(
            "SELECT payload_json, total_students, total_entries, computed_at
             FROM dashboard_snapshots ORDER BY id DESC LIMIT 1",
        )?;

        let row = stmt
            .query_row([], |row| DashboardSnapshotRow::try_from(row))
            .optional()?;

        match row {
            Some(row) => Ok(Some(DashboardSnapshot {
                data: serde_json::from_str(&row.payload_json)?,
                total_students: row.total_students,
                total_entries: row.total_entries,
                computed_at: parse_timestamp(&row.computed_at),
                stale: false,
            })),
            None => Ok(None),
        }
    }
}
