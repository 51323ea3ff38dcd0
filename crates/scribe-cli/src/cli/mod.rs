//! CLI for the scribe transcription job runner.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scribe_core::config;
use scribe_core::store::JobDb;

use commands::{run_add, run_cancel, run_plan, run_remove, run_scheduler, run_status};

/// Top-level CLI for scribe.
#[derive(Debug, Parser)]
#[command(name = "scribe")]
#[command(about = "scribe: chunked media-to-text job runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a transcription job.
    Add {
        /// Media file path or URL.
        source: String,
        /// Engine to try, in order (repeatable). Default: every configured engine, best first.
        #[arg(long = "engine", value_name = "NAME")]
        engines: Vec<String>,
        /// Higher runs sooner.
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        priority: i32,
        /// Engine option passed through as KEY=VALUE (repeatable).
        #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
        options: Vec<(String, String)>,
    },

    /// Run the scheduler until the queue is empty (or until Ctrl-C with --serve).
    Run {
        /// Jobs to run at once (default: max_concurrent_jobs from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Keep running and pick up jobs added later.
        #[arg(long)]
        serve: bool,
    },

    /// Show all jobs, or the details and quality report of one job.
    Status {
        /// Job identifier.
        id: Option<i64>,
    },

    /// Cancel a pending or running job.
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Remove a job and its transcript.
    Remove {
        /// Job identifier.
        id: i64,
        /// Keep the transcript file on disk.
        #[arg(long)]
        keep_files: bool,
    },

    /// Show how an input of the given length would be chunked and how many workers would run.
    Plan {
        /// Input duration in seconds.
        duration: f64,
        /// Engine whose chunking policy to use (default: best configured engine).
        #[arg(long, value_name = "NAME")]
        engine: Option<String>,
        /// Size chunks to keep about N workers busy.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },
}

fn parse_option(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        if let CliCommand::Plan {
            duration,
            engine,
            workers,
        } = &cli.command
        {
            return run_plan(&cfg, *duration, engine.as_deref(), *workers);
        }

        let db = JobDb::open_default().await?;
        match cli.command {
            CliCommand::Add {
                source,
                engines,
                priority,
                options,
            } => run_add(&db, &cfg, &source, engines, priority, options).await?,
            CliCommand::Run { jobs, serve } => run_scheduler(db, &cfg, jobs, serve).await?,
            CliCommand::Status { id } => run_status(&db, id).await?,
            CliCommand::Cancel { id } => run_cancel(&db, id).await?,
            CliCommand::Remove { id, keep_files } => run_remove(&db, id, keep_files).await?,
            CliCommand::Plan { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
