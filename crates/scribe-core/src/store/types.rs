//! Types stored in the job database.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::JobOptions;
use crate::fallback::QualityReport;

/// Job identifier.
pub type JobId = i64;

/// Job status stored as a string in the database.
///
/// Moves only forward: `pending -> running -> {completed | failed | cancelled}`,
/// or `pending -> cancelled`. Recovery after a crash is the one exception and
/// puts `running` jobs back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Statuses a job may be in for `set_status(self)` to apply.
    pub fn allowed_predecessors(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Running => &[JobStatus::Pending],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Running],
            JobStatus::Cancelled => &[JobStatus::Pending, JobStatus::Running],
        }
    }
}

/// A status column value that is not one of the five known statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Fields supplied at submission.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub source_ref: String,
    /// Engine preference, best first. Empty = every registered engine by quality.
    pub engine_chain: Vec<String>,
    pub options: JobOptions,
    /// Higher runs sooner.
    pub priority: i32,
}

/// Full job row.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub source_ref: String,
    pub engine_chain: Vec<String>,
    pub options: JobOptions,
    pub priority: i32,
    pub status: JobStatus,
    /// Percent in [0, 100].
    pub progress: f64,
    pub engine_used: Option<String>,
    pub quality_report: Option<QualityReport>,
    pub error_message: Option<String>,
    /// Merged transcript written by the worker.
    pub output_path: Option<PathBuf>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}
