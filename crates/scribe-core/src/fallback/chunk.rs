use std::sync::Arc;

use crate::engine::{Engine, JobOptions, WorkUnit};
use crate::executor::ChunkResult;
use crate::fallback::ALL_ENGINES_FAILED;
use crate::retry::{run_with_retry, EngineError, RetryPolicy};

/// Offer one chunk to each engine of `chain` in order until one succeeds.
///
/// Engines that are unavailable or cannot process a time span are skipped.
/// Each engine gets the retries `policy` allows for the error kind it returns.
/// `retry_count` on the result counts retries on the engine that produced it
/// (or on the last engine tried, when all failed).
pub fn process_chunk_with_fallback(
    chain: &[Arc<dyn Engine>],
    unit: &WorkUnit,
    index: usize,
    options: &JobOptions,
    policy: &RetryPolicy,
    progress: &dyn Fn(f64),
) -> ChunkResult {
    let chunked = unit.span.is_some();
    let mut advance_reason: Option<String> = None;
    let mut last_error: Option<String> = None;
    let mut last_retries = 0;

    for engine in chain {
        let name = engine.name();
        if !engine.available() {
            tracing::debug!(chunk = index, engine = name, "engine unavailable, skipping");
            advance_reason.get_or_insert_with(|| format!("{} unavailable", name));
            continue;
        }
        if chunked && !engine.supports_chunking() {
            advance_reason.get_or_insert_with(|| format!("{} cannot process chunks", name));
            continue;
        }

        let outcome = run_with_retry(policy, |attempt| {
            tracing::debug!(chunk = index, engine = name, attempt = attempt + 1, "processing chunk");
            progress(0.0);
            let text = engine.process(unit, options, progress)?;
            if text.trim().is_empty() {
                return Err(EngineError::General("empty result".to_string()));
            }
            Ok(text)
        });

        match outcome {
            Ok(done) => {
                let fallback_reason = advance_reason.or_else(|| {
                    (done.retries > 0).then(|| format!("succeeded after {} retries", done.retries))
                });
                if let Some(reason) = &fallback_reason {
                    tracing::info!(chunk = index, engine = name, reason = %reason, "chunk recovered by fallback");
                }
                return ChunkResult {
                    engine_used: Some(name.to_string()),
                    quality_level: engine.descriptor().quality(),
                    retry_count: done.retries,
                    fallback_reason,
                    ..ChunkResult::succeeded(index, done.value)
                };
            }
            Err(exhausted) => {
                tracing::warn!(
                    chunk = index,
                    engine = name,
                    kind = exhausted.kind.as_str(),
                    retries = exhausted.retries,
                    "engine failed, trying next: {}",
                    exhausted.error
                );
                advance_reason.get_or_insert_with(|| {
                    format!("{} failed ({})", name, exhausted.kind.as_str())
                });
                last_error = Some(exhausted.error.to_string());
                last_retries = exhausted.retries;
            }
        }
    }

    let error = last_error.unwrap_or_else(|| "no engine could process this chunk".to_string());
    tracing::error!(chunk = index, error = %error, "all engines failed");
    ChunkResult {
        retry_count: last_retries,
        fallback_reason: Some(ALL_ENGINES_FAILED.to_string()),
        ..ChunkResult::failed(index, error)
    }
}
