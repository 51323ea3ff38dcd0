//! `scribe run` – run the scheduler over queued jobs.

use anyhow::{bail, Result};
use scribe_core::config::{self, ScribeConfig};
use scribe_core::engine::EngineRegistry;
use scribe_core::media::FfprobeSource;
use scribe_core::scheduler::{JobScheduler, PipelineRunner};
use scribe_core::store::JobDb;
use std::sync::Arc;
use std::time::Duration;

/// How often `--serve` looks for jobs added by other processes.
const RESCAN_INTERVAL: Duration = Duration::from_secs(2);

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run_scheduler(db: JobDb, cfg: &ScribeConfig, jobs: Option<usize>, serve: bool) -> Result<()> {
    let registry = EngineRegistry::from_config(cfg);
    if registry.is_empty() {
        bail!(
            "no engines configured; add [[engines]] entries to {}",
            config::config_path()?.display()
        );
    }
    let media = Arc::new(FfprobeSource::new(cfg.probe_command.clone()));
    let runner = Arc::new(PipelineRunner::new(Arc::new(registry), media, cfg.fallback_settings()));

    let mut sched_cfg = cfg.scheduler_config()?;
    if let Some(n) = jobs {
        sched_cfg.max_concurrent_jobs = n.max(1);
    }
    let scheduler = JobScheduler::start(db, runner, sched_cfg).await?;
    let status = scheduler.queue_status();
    println!(
        "Processing {} queued job(s) with up to {} at a time",
        status.queued, status.max_concurrent
    );

    if serve {
        let mut rescan = tokio::time::interval(RESCAN_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("Stopping after running jobs finish...");
                    break;
                }
                _ = rescan.tick() => {
                    let added = scheduler.requeue_pending().await?;
                    if added > 0 {
                        tracing::info!(added, "picked up new jobs");
                    }
                }
                _ = print_progress(&scheduler) => {}
            }
            if scheduler.is_shutting_down() {
                break;
            }
        }
    } else {
        tokio::select! {
            _ = scheduler.wait_idle() => {}
            _ = print_progress(&scheduler) => {}
            _ = tokio::signal::ctrl_c() => println!("Stopping after running jobs finish..."),
        }
    }

    scheduler.shutdown().await?;
    println!("Done.");
    Ok(())
}

/// Print progress of running jobs every second. Never returns.
async fn print_progress(scheduler: &JobScheduler) {
    let mut tick = tokio::time::interval(PROGRESS_INTERVAL);
    tick.tick().await;
    loop {
        tick.tick().await;
        for id in scheduler.queue_status().active_ids {
            if let Ok(Some(view)) = scheduler.get_status(id).await {
                println!("  job {:<5} {:>5.1}%  {}", id, view.progress, view.source_ref);
            }
        }
    }
}
