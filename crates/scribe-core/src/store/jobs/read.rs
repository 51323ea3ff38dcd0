//! Job read operations: get and list.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::PathBuf;

use super::super::db::JobDb;
use super::super::types::{JobId, JobRecord, JobStatus};
use crate::fallback::QualityReport;

const COLUMNS: &str = r#"
    id, source_ref, engine_chain, options_json, priority, status, progress,
    engine_used, quality_report_json, error_message, output_path,
    created_at, started_at, completed_at, updated_at
"#;

fn record_from_row(row: &SqliteRow) -> Result<JobRecord> {
    let id: i64 = row.get("id");
    let engine_chain: String = row.get("engine_chain");
    let options_json: String = row.get("options_json");
    let status_str: String = row.get("status");
    let report_json: Option<String> = row.get("quality_report_json");
    let output_path: Option<String> = row.get("output_path");

    let quality_report = report_json
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(serde_json::from_str::<QualityReport>)
        .transpose()
        .with_context(|| format!("job {}: bad quality report", id))?;

    Ok(JobRecord {
        id,
        source_ref: row.get("source_ref"),
        engine_chain: serde_json::from_str(&engine_chain)
            .with_context(|| format!("job {}: bad engine chain", id))?,
        options: serde_json::from_str(&options_json)
            .with_context(|| format!("job {}: bad options", id))?,
        priority: row.get("priority"),
        status: status_str
            .parse::<JobStatus>()
            .with_context(|| format!("job {}", id))?,
        progress: row.get("progress"),
        engine_used: row.get("engine_used"),
        quality_report,
        error_message: row.get("error_message"),
        output_path: output_path.map(PathBuf::from),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        updated_at: row.get("updated_at"),
    })
}

impl JobDb {
    /// Fetch a single job row.
    pub async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?1", COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(record_from_row).transpose()
    }

    /// Current status only; `None` if the job does not exist.
    pub async fn get_status(&self, id: JobId) -> Result<Option<JobStatus>> {
        let row = sqlx::query("SELECT status FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            r.get::<String, _>("status")
                .parse::<JobStatus>()
                .with_context(|| format!("job {}", id))
        })
        .transpose()
    }

    /// List all jobs, oldest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let sql = format!("SELECT {} FROM jobs ORDER BY id ASC", COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Jobs in any of `statuses`, in dequeue order: higher priority first, then oldest.
    pub async fn list_by_status(&self, statuses: &[JobStatus]) -> Result<Vec<JobRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=statuses.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT {} FROM jobs WHERE status IN ({}) ORDER BY priority DESC, created_at ASC, id ASC",
            COLUMNS,
            placeholders.join(", ")
        );
        let mut q = sqlx::query(&sql);
        for s in statuses {
            q = q.bind(s.as_str());
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Completed jobs whose `completed_at` is before `cutoff` (Unix seconds).
    pub async fn list_completed_before(&self, cutoff: i64) -> Result<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE status = 'completed' AND completed_at < ?1 ORDER BY completed_at ASC",
            COLUMNS
        );
        let rows = sqlx::query(&sql).bind(cutoff).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}
