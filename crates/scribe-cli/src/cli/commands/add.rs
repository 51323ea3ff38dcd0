//! `scribe add <source>` – queue a transcription job.

use anyhow::Result;
use scribe_core::config::ScribeConfig;
use scribe_core::engine::EngineRegistry;
use scribe_core::store::{JobDb, NewJob};

pub async fn run_add(
    db: &JobDb,
    cfg: &ScribeConfig,
    source: &str,
    engines: Vec<String>,
    priority: i32,
    options: Vec<(String, String)>,
) -> Result<()> {
    if !engines.is_empty() {
        EngineRegistry::from_config(cfg).chain_for(&engines)?;
    }
    let job = NewJob {
        source_ref: source.to_string(),
        engine_chain: engines,
        options: options.into_iter().collect(),
        priority,
    };
    let id = db.add_job(&job).await?;
    println!("Added job {id} for {source}");
    Ok(())
}
