use serde::{Deserialize, Serialize};

use crate::engine::EngineProfile;

/// Fewest chunks an adaptive plan aims for.
pub const DEFAULT_MIN_CHUNKS: usize = 2;

/// One time range of a job's input. Spans of a plan partition `[0, duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub index: usize,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl ChunkSpan {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Cut `[0, duration)` into contiguous spans of `chunk_secs`; the last span may
/// be shorter. `chunk_secs == 0` yields a single span over the whole input.
pub fn plan_chunks(duration_secs: f64, chunk_secs: u64) -> Vec<ChunkSpan> {
    if duration_secs <= 0.0 {
        return Vec::new();
    }
    if chunk_secs == 0 {
        return vec![ChunkSpan {
            index: 0,
            start_secs: 0.0,
            end_secs: duration_secs,
        }];
    }
    let step = chunk_secs as f64;
    let count = (duration_secs / step).ceil() as usize;
    (0..count)
        .map(|i| ChunkSpan {
            index: i,
            start_secs: i as f64 * step,
            end_secs: ((i + 1) as f64 * step).min(duration_secs),
        })
        .collect()
}

fn round_to_30(secs: f64) -> f64 {
    ((secs / 30.0).round() * 30.0).max(30.0)
}

/// Chunk length sized for roughly `target_workers` parallel workers.
///
/// Returns `(chunk_secs, expected_chunks)`. The ideal length is
/// `duration / target_workers` rounded to 30 s, then clamped between
/// `max(60, duration / (target_workers * 10))` and
/// `min(2 * profile.chunk_secs, max_chunk_secs)`. A plan with fewer than
/// `min_chunks` chunks is shrunk to `duration / min_chunks` (rounded to 30 s).
pub fn adaptive_chunk_size(
    duration_secs: f64,
    profile: &EngineProfile,
    target_workers: usize,
    min_chunks: usize,
    max_chunk_secs: u64,
) -> (u64, usize) {
    if !profile.chunks() {
        return (duration_secs.max(0.0).ceil() as u64, 1);
    }
    if duration_secs <= 0.0 {
        return (profile.chunk_secs, 0);
    }
    let target = target_workers.max(1) as f64;
    let lower = (duration_secs / (target * 10.0)).max(60.0);
    let upper = (2 * profile.chunk_secs).min(max_chunk_secs.max(1)) as f64;

    let mut chunk = round_to_30(duration_secs / target).max(lower).min(upper);
    let mut expected = (duration_secs / chunk).ceil() as usize;

    if min_chunks > 0 && expected < min_chunks {
        chunk = round_to_30(duration_secs / min_chunks as f64);
        expected = (duration_secs / chunk).ceil() as usize;
    }
    (chunk.round() as u64, expected)
}
