use std::sync::Arc;

use crate::engine::{Engine, JobOptions, WorkUnit};
use crate::executor::ChunkResult;
use crate::fallback::ALL_ENGINES_FAILED;

/// Try each available engine once on the whole input; first success wins.
/// The result is reported as chunk 0 of a one-chunk job.
pub fn process_whole(
    chain: &[Arc<dyn Engine>],
    unit: &WorkUnit,
    options: &JobOptions,
    progress: &dyn Fn(f64),
) -> ChunkResult {
    let mut advance_reason: Option<String> = None;
    let mut last_error: Option<String> = None;

    for engine in chain {
        let name = engine.name();
        if !engine.available() {
            advance_reason.get_or_insert_with(|| format!("{} unavailable", name));
            continue;
        }
        tracing::info!(engine = name, source = %unit.source, "processing whole input");
        match engine.process(unit, options, progress) {
            Ok(text) if !text.trim().is_empty() => {
                return ChunkResult {
                    engine_used: Some(name.to_string()),
                    quality_level: engine.descriptor().quality(),
                    fallback_reason: advance_reason,
                    ..ChunkResult::succeeded(0, text)
                };
            }
            Ok(_) => {
                tracing::warn!(engine = name, "engine returned empty text");
                advance_reason.get_or_insert_with(|| format!("{} returned empty text", name));
                last_error = Some("empty result".to_string());
            }
            Err(e) => {
                tracing::warn!(engine = name, "engine failed: {}", e);
                advance_reason.get_or_insert_with(|| format!("{} failed", name));
                last_error = Some(e.to_string());
            }
        }
    }

    ChunkResult {
        fallback_reason: Some(ALL_ENGINES_FAILED.to_string()),
        ..ChunkResult::failed(
            0,
            last_error.unwrap_or_else(|| "no engine available".to_string()),
        )
    }
}
