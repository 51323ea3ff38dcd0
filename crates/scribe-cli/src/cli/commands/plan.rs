//! `scribe plan <duration>` – dry run of chunking and worker allocation.

use anyhow::{bail, Result};
use scribe_core::config::ScribeConfig;
use scribe_core::engine::{EngineProfile, EngineRegistry};
use scribe_core::executor::ParallelExecutor;
use scribe_core::planner::{available_memory, plan_chunks};

pub fn run_plan(cfg: &ScribeConfig, duration_secs: f64, engine: Option<&str>, workers: Option<usize>) -> Result<()> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        bail!("duration must be a positive number of seconds");
    }
    let registry = EngineRegistry::from_config(cfg);
    let engine = match engine {
        Some(name) => name.to_string(),
        None => registry
            .names()
            .into_iter()
            .next()
            .unwrap_or_else(|| "unknown".to_string()),
    };
    let profile = registry
        .profile(&engine)
        .cloned()
        .unwrap_or_else(|| EngineProfile::builtin(&engine));

    let mut settings = cfg.fallback_settings();
    if workers.is_some() {
        settings.target_workers = workers;
    }

    if profile.chunks() {
        println!("Engine {} (chunk policy {}s)", engine, profile.chunk_secs);
    } else {
        println!("Engine {} (no chunk policy)", engine);
    }
    if duration_secs < settings.whole_job_threshold_secs {
        println!(
            "{:.0}s is below the {:.0}s threshold: processed whole, 1 worker",
            duration_secs, settings.whole_job_threshold_secs
        );
        return Ok(());
    }

    let chunk_secs = settings.chunk_secs_for(duration_secs, &profile);
    let spans = plan_chunks(duration_secs, chunk_secs);
    let alloc_profile = profile.with_chunk_secs(chunk_secs);
    let memory = available_memory();
    let worker_count = ParallelExecutor::new(settings.bounds)
        .with_available_memory(memory)
        .worker_count(spans.len(), duration_secs, &alloc_profile, settings.target_workers);

    println!(
        "{} chunks of {}s, {} worker(s){}",
        spans.len(),
        chunk_secs,
        worker_count,
        memory
            .map(|m| format!(", {:.1} GiB available", m as f64 / (1u64 << 30) as f64))
            .unwrap_or_default()
    );
    for span in &spans {
        println!(
            "  chunk {:<4} {:>8.1}s - {:>8.1}s",
            span.index + 1,
            span.start_secs,
            span.end_secs
        );
    }
    Ok(())
}
