//! Bounded parallel execution of chunk work with two-level progress.
//!
//! [`ParallelExecutor::process_chunks`] sizes a worker pool with the planner,
//! runs one call per chunk on scoped OS threads, and returns results indexed
//! by chunk position regardless of completion order. A failing or panicking
//! chunk yields a failed [`ChunkResult`]; it never aborts its siblings.

mod merge;
mod pool;
mod progress;

pub use merge::{merge_results, MergedText};
pub use pool::{ChunkContext, ExecHooks, ParallelExecutor};
pub use progress::{ProgressMonitor, ProgressStats, RunSummary, WorkerStats};

use std::time::Duration;

use crate::engine::QualityLevel;

/// Outcome of processing one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub index: usize,
    pub text: String,
    pub success: bool,
    pub error: Option<String>,
    pub processing_time: Duration,
    pub engine_used: Option<String>,
    pub quality_level: QualityLevel,
    pub retry_count: u32,
    /// Why the chunk was not served by the first attempt on the first engine.
    pub fallback_reason: Option<String>,
}

impl ChunkResult {
    pub fn succeeded(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            success: true,
            error: None,
            processing_time: Duration::ZERO,
            engine_used: None,
            quality_level: QualityLevel::High,
            retry_count: 0,
            fallback_reason: None,
        }
    }

    pub fn failed(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            text: String::new(),
            success: false,
            error: Some(error.into()),
            processing_time: Duration::ZERO,
            engine_used: None,
            quality_level: QualityLevel::Failed,
            retry_count: 0,
            fallback_reason: None,
        }
    }

    /// Mark a result as failed, keeping engine and retry bookkeeping.
    pub(crate) fn demote(&mut self, error: impl Into<String>) {
        self.success = false;
        self.text.clear();
        self.quality_level = QualityLevel::Failed;
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }
}
