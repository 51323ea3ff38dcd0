//! Quality-degrading fallback across an ordered engine chain.
//!
//! Each unit of work is offered to the chain's engines in order. Failures are
//! classified and either retried on the same engine or passed down the chain.
//! Short jobs go through the chain once as a whole; long jobs are cut into
//! chunks and run on the [`ParallelExecutor`](crate::executor::ParallelExecutor).

mod chunk;
mod report;
mod transcribe;
mod whole;

pub use chunk::process_chunk_with_fallback;
pub use report::{merge_annotated, QualityCounts, QualityRating, QualityReport};
pub use transcribe::{FallbackEngine, FallbackSettings, Transcript};
pub use whole::process_whole;

/// Fallback reason recorded on a chunk no engine could process.
pub const ALL_ENGINES_FAILED: &str = "all engines failed";

#[cfg(test)]
mod tests;
