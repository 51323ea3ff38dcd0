//! Two-level progress: percent within each in-flight chunk plus completed chunks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Snapshot of a chunked run (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Chunks finished (successfully or not).
    pub completed_chunks: usize,
    pub total_chunks: usize,
    /// Sum over in-flight chunks of their percent / 100.
    pub partial_chunks: f64,
    pub workers: usize,
    /// Elapsed time since the run started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// `completed + Σ partial% / 100`, in chunks.
    pub fn aggregate(&self) -> f64 {
        (self.completed_chunks as f64 + self.partial_chunks).min(self.total_chunks as f64)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_chunks == 0 {
            return 1.0;
        }
        (self.aggregate() / self.total_chunks as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    /// Completed chunks per second (0 if elapsed is 0).
    pub fn chunks_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.aggregate() / self.elapsed_secs
    }

    /// Estimated seconds remaining (None while the rate is unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_chunks as f64 - self.aggregate();
        if remaining <= 0.0 {
            return Some(0.0);
        }
        let rate = self.chunks_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining / rate)
    }
}

/// Per-worker totals reported when a run finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStats {
    pub worker: usize,
    pub chunks: usize,
    pub avg_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub completed_chunks: usize,
    pub elapsed: Duration,
    pub workers: Vec<WorkerStats>,
}

struct InFlight {
    chunk: usize,
    percent: f64,
    started: Instant,
}

#[derive(Default)]
struct MonitorState {
    completed: usize,
    in_flight: HashMap<usize, InFlight>,
    worker_times: BTreeMap<usize, Vec<Duration>>,
}

/// Shared by the chunk workers (writers) and the progress reporter (reader).
pub struct ProgressMonitor {
    total_chunks: usize,
    workers: usize,
    started: Instant,
    state: Mutex<MonitorState>,
}

impl ProgressMonitor {
    pub fn new(total_chunks: usize, workers: usize) -> Self {
        Self {
            total_chunks,
            workers,
            started: Instant::now(),
            state: Mutex::new(MonitorState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_chunk(&self, worker: usize, chunk: usize) {
        self.state().in_flight.insert(
            worker,
            InFlight {
                chunk,
                percent: 0.0,
                started: Instant::now(),
            },
        );
    }

    /// Record percent-within-chunk. Ignored unless `worker` is on `chunk`.
    pub fn update_chunk(&self, worker: usize, chunk: usize, percent: f64) {
        let mut st = self.state();
        if let Some(f) = st.in_flight.get_mut(&worker) {
            if f.chunk == chunk && percent.is_finite() {
                f.percent = percent.clamp(0.0, 100.0);
            }
        }
    }

    /// Mark the worker's chunk done and return how long it took.
    pub fn complete_chunk(&self, worker: usize, chunk: usize) -> Duration {
        let mut st = self.state();
        let elapsed = match st.in_flight.get(&worker) {
            Some(f) if f.chunk == chunk => Some(f.started.elapsed()),
            _ => None,
        };
        if let Some(d) = elapsed {
            st.in_flight.remove(&worker);
            st.worker_times.entry(worker).or_default().push(d);
        }
        st.completed += 1;
        elapsed.unwrap_or_default()
    }

    pub fn snapshot(&self) -> ProgressStats {
        let st = self.state();
        let partial_chunks = st.in_flight.values().map(|f| f.percent / 100.0).sum();
        ProgressStats {
            completed_chunks: st.completed,
            total_chunks: self.total_chunks,
            partial_chunks,
            workers: self.workers,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    pub fn finish(&self) -> RunSummary {
        let st = self.state();
        let workers = st
            .worker_times
            .iter()
            .map(|(worker, times)| {
                let total: Duration = times.iter().sum();
                WorkerStats {
                    worker: *worker,
                    chunks: times.len(),
                    avg_time: total / times.len().max(1) as u32,
                }
            })
            .collect();
        RunSummary {
            completed_chunks: st.completed,
            elapsed: self.started.elapsed(),
            workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_counts_partial_chunks() {
        let m = ProgressMonitor::new(4, 2);
        m.start_chunk(0, 0);
        m.start_chunk(1, 1);
        m.update_chunk(0, 0, 50.0);
        m.update_chunk(1, 1, 25.0);
        let s = m.snapshot();
        assert!((s.aggregate() - 0.75).abs() < 1e-9);

        m.complete_chunk(0, 0);
        let s = m.snapshot();
        assert_eq!(s.completed_chunks, 1);
        assert!((s.aggregate() - 1.25).abs() < 1e-9);
        assert!((s.fraction() - 1.25 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn stale_update_is_ignored_and_percent_clamped() {
        let m = ProgressMonitor::new(2, 1);
        m.start_chunk(0, 1);
        m.update_chunk(0, 0, 80.0);
        assert_eq!(m.snapshot().partial_chunks, 0.0);
        m.update_chunk(0, 1, 250.0);
        assert!((m.snapshot().partial_chunks - 1.0).abs() < 1e-9);
    }

    #[test]
    fn eta_and_rate() {
        let s = ProgressStats {
            completed_chunks: 2,
            total_chunks: 8,
            partial_chunks: 0.0,
            workers: 2,
            elapsed_secs: 10.0,
        };
        assert!((s.chunks_per_sec() - 0.2).abs() < 1e-9);
        assert!((s.eta_secs().unwrap() - 30.0).abs() < 1e-9);
        assert!((s.percent() - 25.0).abs() < 1e-9);

        let idle = ProgressStats {
            elapsed_secs: 0.0,
            completed_chunks: 0,
            ..s
        };
        assert_eq!(idle.eta_secs(), None);
    }

    #[test]
    fn finish_reports_per_worker_counts() {
        let m = ProgressMonitor::new(3, 2);
        for (worker, chunk) in [(0, 0), (1, 1), (0, 2)] {
            m.start_chunk(worker, chunk);
            m.complete_chunk(worker, chunk);
        }
        let summary = m.finish();
        assert_eq!(summary.completed_chunks, 3);
        let counts: Vec<(usize, usize)> = summary.workers.iter().map(|w| (w.worker, w.chunks)).collect();
        assert_eq!(counts, vec![(0, 2), (1, 1)]);
    }
}
