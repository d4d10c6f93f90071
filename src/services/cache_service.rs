use std::sync::Arc;

use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task;
use tracing::debug;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::ai_types::GoalAnalysisPayload;
use crate::services::ai_cache::{AiCacheKey, AiCacheOperation};

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ai_cache (
    cache_key TEXT PRIMARY KEY,
    operation TEXT NOT NULL CHECK(operation IN ('goal')),
    semantic_hash TEXT NOT NULL,
    raw_input TEXT NOT NULL,
    response_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    hit_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_ai_cache_semantic_hash
    ON ai_cache(semantic_hash);
CREATE INDEX IF NOT EXISTS idx_ai_cache_expires_at
    ON ai_cache(expires_at);
"#;

/// SQLite-backed store for analyzer responses, keyed by semantic hash.
#[derive(Debug, Clone)]
pub struct CacheService {
    db: Arc<DbPool>,
    ttl: Duration,
}

impl CacheService {
    pub fn new(db: DbPool, ttl: Duration) -> AppResult<Self> {
        let service = Self {
            db: Arc::new(db),
            ttl,
        };
        service.db.with_connection(ensure_schema)?;
        Ok(service)
    }

    pub async fn get_goal(&self, semantic_hash: &str) -> AppResult<Option<GoalAnalysisPayload>> {
        self.get(AiCacheKey::new(AiCacheOperation::GoalAnalysis, semantic_hash))
            .await
    }

    pub async fn put_goal(
        &self,
        semantic_hash: &str,
        raw_input: &str,
        payload: &GoalAnalysisPayload,
    ) -> AppResult<()> {
        self.put(
            AiCacheKey::new(AiCacheOperation::GoalAnalysis, semantic_hash),
            raw_input,
            payload,
        )
        .await
    }

    pub async fn purge_expired(&self) -> AppResult<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db.get_connection()?;
            ensure_schema(&conn)?;
            let now = Utc::now().to_rfc3339();
            let deleted = conn.execute("DELETE FROM ai_cache WHERE expires_at <= ?1", [&now])?;
            if deleted > 0 {
                debug!(target: "app::ai::cache", deleted, "purged expired cache entries");
            }
            Ok(deleted)
        })
        .await
        .map_err(|err| AppError::other(format!("cache purge task failed: {err}")))?
    }

    pub async fn clear(&self) -> AppResult<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db.get_connection()?;
            ensure_schema(&conn)?;
            Ok(conn.execute("DELETE FROM ai_cache", [])?)
        })
        .await
        .map_err(|err| AppError::other(format!("cache clear task failed: {err}")))?
    }

    async fn get<T>(&self, key: AiCacheKey) -> AppResult<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let cache_key: String = (&key).into();
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || {
            let conn = db.get_connection()?;
            ensure_schema(&conn)?;

            let now = Utc::now().to_rfc3339();
            let payload = conn
                .query_row(
                    "SELECT response_json FROM ai_cache WHERE cache_key = ?1 AND expires_at > ?2",
                    [&cache_key, &now],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;

            let Some(payload) = payload else {
                return Ok(None);
            };

            let value: T = serde_json::from_str(&payload)?;
            conn.execute(
                "UPDATE ai_cache SET hit_count = hit_count + 1 WHERE cache_key = ?1",
                [&cache_key],
            )?;

            debug!(
                target: "app::ai::cache",
                cache_key = %cache_key,
                operation = key.operation().as_str(),
                "cache hit"
            );
            Ok(Some(value))
        })
        .await
        .map_err(|err| AppError::other(format!("cache lookup task failed: {err}")))?
    }

    async fn put<T: Serialize>(&self, key: AiCacheKey, raw_input: &str, value: &T) -> AppResult<()> {
        let cache_key: String = (&key).into();
        let operation = key.operation().as_str();
        let semantic_hash = key.semantic_hash().to_string();
        let input = raw_input.to_string();
        let response_json = serde_json::to_string(value)?;
        let db = Arc::clone(&self.db);
        let ttl = self.ttl;

        task::spawn_blocking(move || {
            let conn = db.get_connection()?;
            ensure_schema(&conn)?;

            let now = Utc::now();
            conn.execute(
                r#"
                INSERT INTO ai_cache (
                    cache_key, operation, semantic_hash, raw_input,
                    response_json, created_at, expires_at, hit_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
                ON CONFLICT(cache_key) DO UPDATE SET
                    raw_input = excluded.raw_input,
                    response_json = excluded.response_json,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at
                "#,
                (
                    &cache_key,
                    operation,
                    &semantic_hash,
                    &input,
                    &response_json,
                    now.to_rfc3339(),
                    (now + ttl).to_rfc3339(),
                ),
            )?;

            debug!(
                target: "app::ai::cache",
                cache_key = %cache_key,
                operation,
                "cached analyzer response"
            );
            Ok(())
        })
        .await
        .map_err(|err| AppError::other(format!("cache write task failed: {err}")))?
    }
}

fn ensure_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(())
}
