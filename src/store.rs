//! Durable per-thread observation storage using SQLite

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;

use crate::error::{MemoryError, Result};
use crate::types::{MemoryRecord, Observation, Priority};

/// Keyed storage for conversation memory records.
///
/// A save replaces the thread's persisted state wholesale inside one
/// transaction, so a concurrent load on the same thread never observes a
/// half-written record. Different threads are fully independent.
#[derive(Clone)]
pub struct ObservationStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for ObservationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationStore")
            .field("pool", &"<SqlitePool>")
            .finish()
    }
}

impl ObservationStore {
    /// Create a store over an existing SQLite pool
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Arc::new(Self { pool })
    }

    /// Open (or create) the database at `path` and run migrations
    pub async fn connect(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MemoryError::Database(e.into()))?;

        Ok(Self::new(pool))
    }

    /// Create an in-memory store for testing
    pub async fn connect_in_memory() -> Result<Arc<Self>> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .create_if_missing(true);

        let pool = sqlx::pool::PoolOptions::<sqlx::Sqlite>::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MemoryError::Database(e.into()))?;

        Ok(Self::new(pool))
    }

    /// Get a reference to the SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load the record for a thread, or `None` if the thread is unknown
    pub async fn load(&self, thread_id: &str) -> Result<Option<MemoryRecord>> {
        let scalar = sqlx::query(
            r#"
            SELECT current_task, suggested_response, last_observed_at
            FROM memory_records
            WHERE thread_id = ?
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(scalar) = scalar else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT timestamp, priority, content, referenced_date
            FROM observations
            WHERE thread_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        let mut observations = Vec::with_capacity(rows.len());
        for row in &rows {
            let priority: String = row.try_get("priority")?;
            observations.push(Observation {
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                priority: priority.parse().unwrap_or(Priority::Medium),
                content: row.try_get("content")?,
                referenced_date: row.try_get::<Option<DateTime<Utc>>, _>("referenced_date")?,
            });
        }

        Ok(Some(MemoryRecord {
            observations,
            current_task: scalar.try_get::<Option<String>, _>("current_task")?.unwrap_or_default(),
            suggested_response: scalar
                .try_get::<Option<String>, _>("suggested_response")?
                .unwrap_or_default(),
            last_observed_at: scalar.try_get::<Option<DateTime<Utc>>, _>("last_observed_at")?,
        }))
    }

    /// Save a thread's record, replacing whatever was persisted before
    pub async fn save(&self, thread_id: &str, record: &MemoryRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO memory_records (thread_id, current_task, suggested_response, last_observed_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                current_task = excluded.current_task,
                suggested_response = excluded.suggested_response,
                last_observed_at = excluded.last_observed_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(thread_id)
        .bind(&record.current_task)
        .bind(&record.suggested_response)
        .bind(record.last_observed_at)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM observations WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&mut *tx)
            .await?;

        for (position, obs) in record.observations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO observations (thread_id, position, timestamp, priority, content, referenced_date)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(thread_id)
            .bind(position as i64)
            .bind(obs.timestamp)
            .bind(obs.priority.to_string())
            .bind(&obs.content)
            .bind(obs.referenced_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> MemoryRecord {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 10, 10, 0, 0).unwrap();
        MemoryRecord {
            observations: vec![
                Observation::new(t0, Priority::High, "User mentioned family (children)"),
                Observation::new(
                    t0 + chrono::Duration::minutes(5),
                    Priority::Low,
                    "Weather small talk",
                )
                .with_referenced_date(Utc.with_ymd_and_hms(2026, 2, 3, 0, 0, 0).unwrap()),
            ],
            current_task: "Plan a family trip".to_string(),
            suggested_response: "Ask about destinations".to_string(),
            last_observed_at: Some(t0),
        }
    }

    #[tokio::test]
    async fn load_of_unknown_thread_is_none() {
        let store = ObservationStore::connect_in_memory().await.unwrap();
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_load_round_trip_preserves_order_and_fields() {
        let store = ObservationStore::connect_in_memory().await.unwrap();
        let record = sample_record();

        store.save("thread-1", &record).await.unwrap();
        let loaded = store.load("thread-1").await.unwrap().unwrap();

        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn save_is_a_full_replace() {
        let store = ObservationStore::connect_in_memory().await.unwrap();
        let record = sample_record();
        store.save("thread-1", &record).await.unwrap();

        let t1 = Utc.with_ymd_and_hms(2026, 2, 11, 9, 0, 0).unwrap();
        let replacement = MemoryRecord {
            observations: vec![Observation::new(t1, Priority::High, "Consolidated")],
            current_task: String::new(),
            suggested_response: String::new(),
            last_observed_at: Some(t1),
        };
        store.save("thread-1", &replacement).await.unwrap();

        let loaded = store.load("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded.observations.len(), 1);
        assert_eq!(loaded.observations[0].content, "Consolidated");
        assert!(loaded.current_task.is_empty());
    }

    #[tokio::test]
    async fn threads_are_independent() {
        let store = ObservationStore::connect_in_memory().await.unwrap();
        store.save("thread-a", &sample_record()).await.unwrap();

        assert!(store.load("thread-b").await.unwrap().is_none());

        let empty = MemoryRecord::default();
        store.save("thread-b", &empty).await.unwrap();
        let a = store.load("thread-a").await.unwrap().unwrap();
        assert_eq!(a.observations.len(), 2);
    }

    #[tokio::test]
    async fn persists_to_disk_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.db");

        {
            let store = ObservationStore::connect(&path).await.unwrap();
            store.save("thread-1", &sample_record()).await.unwrap();
        }

        let store = ObservationStore::connect(&path).await.unwrap();
        let loaded = store.load("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded, sample_record());
    }
}
