//! SQLite-backed checkpoint store for resuming interrupted jobs.
//!
//! WAL mode, `SqlitePoolOptions`, `sqlx::query` with bound parameters,
//! and a two-phase status model: a URL is marked `in_progress` before
//! work starts and flipped to `done` only after a successful merge, so
//! a crash mid-fetch leaves it recoverable via `incomplete()`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;

/// Per-job checkpoint store. The table name is derived from the job's
/// slug so that multiple jobs can share one `checkpoints.db` file without
/// colliding.
pub struct CheckpointStore {
    pool: SqlitePool,
    table: String,
    /// In-memory mirror of `done` URLs for lock-free `is_done` checks.
    done_cache: RwLock<HashSet<String>>,
}

impl CheckpointStore {
    /// Open (creating if absent) the checkpoint database at `dir/checkpoints.db`
    /// and ensure this job's table exists.
    pub async fn open(dir: &Path, job_slug: &str) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .context("failed to create checkpoint directory")?;
        let db_path = dir.join("checkpoints.db");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("failed to open checkpoint database")?;

        let table = format!("scrape_{job_slug}");
        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                url TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#
        );
        sqlx::query(&create)
            .execute(&pool)
            .await
            .context("failed to create checkpoint table")?;

        let done_rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT url FROM {table} WHERE status = 'done'"))
                .fetch_all(&pool)
                .await
                .context("failed to load checkpoint cache")?;
        let done_cache = RwLock::new(done_rows.into_iter().map(|(u,)| u).collect());

        Ok(Self {
            pool,
            table,
            done_cache,
        })
    }

    pub async fn is_done(&self, url: &str) -> bool {
        self.done_cache.read().await.contains(url)
    }

    /// Record that `url` is about to be fetched; if the process crashes
    /// before `mark_done`, `incomplete()` will surface it for re-queuing.
    pub async fn mark_in_progress(&self, url: &str) -> Result<()> {
        let query = format!(
            "INSERT OR REPLACE INTO {} (url, status, updated_at) VALUES (?, 'in_progress', unixepoch())",
            self.table
        );
        sqlx::query(&query)
            .bind(url)
            .execute(&self.pool)
            .await
            .context("failed to mark checkpoint in-progress")?;
        Ok(())
    }

    pub async fn mark_done(&self, url: &str) -> Result<()> {
        let query = format!(
            "INSERT OR REPLACE INTO {} (url, status, updated_at) VALUES (?, 'done', unixepoch())",
            self.table
        );
        sqlx::query(&query)
            .bind(url)
            .execute(&self.pool)
            .await
            .context("failed to mark checkpoint done")?;
        self.done_cache.write().await.insert(url.to_string());
        Ok(())
    }

    /// URLs left `in_progress` by a previous, interrupted run.
    pub async fn incomplete(&self) -> Result<Vec<String>> {
        let query = format!("SELECT url FROM {} WHERE status = 'in_progress'", self.table);
        let rows: Vec<(String,)> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .context("failed to query incomplete checkpoints")?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
