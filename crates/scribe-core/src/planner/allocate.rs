use crate::engine::EngineProfile;

/// Fraction of available memory chunk workers may use together.
pub const MEMORY_HEADROOM: f64 = 0.7;

/// Configured lower/upper bound on chunk workers per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerBounds {
    pub min: usize,
    pub max: usize,
}

impl WorkerBounds {
    /// Normalizes to `1 <= min <= max`.
    pub fn new(min: usize, max: usize) -> Self {
        let max = max.max(1);
        Self {
            min: min.clamp(1, max),
            max,
        }
    }
}

impl Default for WorkerBounds {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Derived sizing for one job. Recomputed per job, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerAllocation {
    pub chunk_count: usize,
    pub chunk_secs: u64,
    pub worker_count: usize,
}

/// `ceil(duration / chunk_secs)`; 0 for an empty input or a non-chunking engine.
pub fn total_chunks(duration_secs: f64, chunk_secs: u64) -> usize {
    if chunk_secs == 0 || duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs / chunk_secs as f64).ceil() as usize
}

/// Worker count for a job before memory limits.
///
/// Prefers a divisor of the chunk count so no worker sits idle on the last
/// round. The result never exceeds the chunk count or `max_workers`; the
/// `min_workers` bound holds whenever there are at least that many chunks.
pub fn optimal_workers(
    duration_secs: f64,
    profile: &EngineProfile,
    min_workers: usize,
    max_workers: usize,
) -> usize {
    if !profile.chunks() {
        return 1;
    }
    let bounds = WorkerBounds::new(min_workers, max_workers);
    let total = total_chunks(duration_secs, profile.chunk_secs).max(1);

    let divisors: Vec<usize> = (bounds.min..=bounds.max)
        .filter(|w| total % w == 0)
        .collect();

    let computed = if total <= bounds.max {
        divisors.last().copied().unwrap_or_else(|| total.min(bounds.max))
    } else if divisors.is_empty() {
        if total <= 20 {
            7
        } else {
            (total / 4).max(5).min(bounds.max)
        }
    } else {
        divisors
            .iter()
            .copied()
            .find(|w| (2..=10).contains(&(total / w)))
            .unwrap_or(bounds.max)
    };

    let upper = total.min(bounds.max);
    computed.clamp(bounds.min.min(upper), upper)
}

/// Cap `workers` so their combined memory estimate stays within
/// [`MEMORY_HEADROOM`] of `available_bytes`. Unknown memory leaves it unchanged.
pub fn adjust_by_memory(workers: usize, profile: &EngineProfile, available_bytes: Option<u64>) -> usize {
    let per_worker = profile.memory_per_worker_bytes();
    let Some(available) = available_bytes else {
        return workers.max(1);
    };
    if per_worker == 0 {
        return workers.max(1);
    }
    let cap = ((available as f64 * MEMORY_HEADROOM) / per_worker as f64).floor() as usize;
    if cap < workers {
        tracing::warn!(
            engine = %profile.name,
            requested = workers,
            allowed = cap.max(1),
            available_gb = available as f64 / (1u64 << 30) as f64,
            per_worker_gb = profile.memory_per_worker_gb,
            "reducing chunk workers due to memory"
        );
    }
    workers.min(cap).max(1)
}

/// Chunk count, chunk length and worker count for a job.
pub fn allocate(
    duration_secs: f64,
    profile: &EngineProfile,
    bounds: WorkerBounds,
    available_bytes: Option<u64>,
) -> WorkerAllocation {
    if !profile.chunks() {
        return WorkerAllocation {
            chunk_count: usize::from(duration_secs > 0.0),
            chunk_secs: 0,
            worker_count: 1,
        };
    }
    let computed = optimal_workers(duration_secs, profile, bounds.min, bounds.max);
    let worker_count = adjust_by_memory(computed, profile, available_bytes).min(bounds.max);
    WorkerAllocation {
        chunk_count: total_chunks(duration_secs, profile.chunk_secs),
        chunk_secs: profile.chunk_secs,
        worker_count: worker_count.max(1),
    }
}
