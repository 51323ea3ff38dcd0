//! Job write operations: add, status, progress, result, demote, remove.

use anyhow::Result;
use std::path::Path;

use super::super::db::{unix_timestamp, JobDb};
use super::super::types::{JobId, JobStatus, NewJob};
use crate::fallback::QualityReport;

impl JobDb {
    /// Insert a new pending job and return its id.
    pub async fn add_job(&self, job: &NewJob) -> Result<JobId> {
        let now = unix_timestamp();
        let engine_chain = serde_json::to_string(&job.engine_chain)?;
        let options_json = serde_json::to_string(&job.options)?;

        let row_id = sqlx::query(
            r#"
            INSERT INTO jobs (
                source_ref, engine_chain, options_json, priority,
                status, progress, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            "#,
        )
        .bind(&job.source_ref)
        .bind(engine_chain)
        .bind(options_json)
        .bind(job.priority)
        .bind(JobStatus::Pending.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Move a job to `status` if its current status allows it.
    ///
    /// Returns false (and changes nothing) for a regression or an unknown id.
    /// Sets `started_at` on `running` and `completed_at` on terminal statuses.
    pub async fn set_status(&self, id: JobId, status: JobStatus) -> Result<bool> {
        let from = status.allowed_predecessors();
        if from.is_empty() {
            return Ok(false);
        }
        let now = unix_timestamp();
        let placeholders: Vec<String> = (0..from.len()).map(|i| format!("?{}", i + 4)).collect();
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = ?1,
                updated_at = ?2,
                started_at = CASE WHEN ?1 = 'running' THEN ?2 ELSE started_at END,
                completed_at = CASE WHEN ?1 IN ('completed', 'failed', 'cancelled') THEN ?2 ELSE completed_at END
            WHERE id = ?3 AND status IN ({})
            "#,
            placeholders.join(", ")
        );
        let mut q = sqlx::query(&sql).bind(status.as_str()).bind(now).bind(id);
        for s in from {
            q = q.bind(s.as_str());
        }
        let r = q.execute(&self.pool).await?;
        Ok(r.rows_affected() == 1)
    }

    /// Update progress percent of a running job. Ignored for any other status.
    pub async fn set_progress(&self, id: JobId, percent: f64) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE jobs
            SET progress = ?1,
                updated_at = ?2
            WHERE id = ?3 AND status = 'running'
            "#,
        )
        .bind(percent.clamp(0.0, 100.0))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_error(&self, id: JobId, message: &str) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE jobs
            SET error_message = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record what a run produced. Fields passed as `None` are cleared.
    pub async fn set_result(
        &self,
        id: JobId,
        engine_used: Option<&str>,
        report: Option<&QualityReport>,
        output_path: Option<&Path>,
    ) -> Result<()> {
        let now = unix_timestamp();
        let report_json = report.map(serde_json::to_string).transpose()?;
        let output_path = output_path.map(|p| p.to_string_lossy().into_owned());
        sqlx::query(
            r#"
            UPDATE jobs
            SET engine_used = ?1,
                quality_report_json = ?2,
                output_path = ?3,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(engine_used)
        .bind(report_json)
        .bind(output_path)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put every `running` job back to `pending` (e.g. after a crash) with its
    /// progress reset; jobs restart from scratch. Returns the number of jobs reset.
    pub async fn demote_running_jobs(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                progress = 0,
                started_at = NULL,
                updated_at = ?1
            WHERE status = 'running'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Permanently remove a job row. Returns false if it did not exist.
    ///
    /// Transcript files are deleted separately by the scheduler.
    pub async fn remove_job(&self, id: JobId) -> Result<bool> {
        let r = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(r.rows_affected() == 1)
    }
}
