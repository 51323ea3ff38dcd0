//! Worker allocation and chunk planning.
//!
//! Given a job's duration and the primary engine's [`EngineProfile`], decide
//! how the input is cut into chunks and how many chunk workers run at once.
//!
//! [`EngineProfile`]: crate::engine::EngineProfile

mod allocate;
mod chunk;
mod memory;

pub use allocate::{
    adjust_by_memory, allocate, optimal_workers, total_chunks, WorkerAllocation, WorkerBounds,
    MEMORY_HEADROOM,
};
pub use chunk::{adaptive_chunk_size, plan_chunks, ChunkSpan, DEFAULT_MIN_CHUNKS};
pub use memory::available_memory;
