use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::fallback::FallbackSettings;
use crate::planner::WorkerBounds;
use crate::retry::RetryPolicy;
use crate::scheduler::SchedulerConfig;

/// Retry policy parameters for the per-chunk fallback chain (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed on one engine for network-class errors (first attempt not counted).
    pub max_retries: u32,
    /// Base of the exponential backoff: the n-th retry waits `base_delay_secs ^ n` seconds.
    pub base_delay_secs: f64,
    /// Upper bound on a single backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2.0,
            max_delay_secs: 60,
        }
    }
}

/// An external command registered as a transcription engine.
///
/// `command[0]` is the executable; the remaining entries are arguments in which
/// `{input}`, `{start}`, `{end}` and `{duration}` are substituted per work unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    /// Lower rank = higher quality. Rank 0 is "high", 1 "medium", 2+ "low".
    pub quality_rank: u8,
    pub command: Vec<String>,
    /// Whether the command can process a time range of the input.
    #[serde(default = "default_true")]
    pub supports_chunking: bool,
    /// Path (model file, credentials) that must exist for the engine to be available.
    #[serde(default)]
    pub requires_resource: Option<PathBuf>,
    /// Overrides the built-in chunk length policy for this engine.
    #[serde(default)]
    pub chunk_secs: Option<u64>,
    /// Overrides the built-in per-worker memory estimate for this engine.
    #[serde(default)]
    pub memory_per_worker_gb: Option<f64>,
}

fn default_true() -> bool {
    true
}

/// Global configuration loaded from `~/.config/scribe/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScribeConfig {
    /// Minimum number of chunk workers per job.
    pub min_workers: usize,
    /// Maximum number of chunk workers per job.
    pub max_workers: usize,
    /// Number of jobs the scheduler runs at once.
    pub max_concurrent_jobs: usize,
    /// Jobs shorter than this (seconds) are processed whole, without chunking.
    pub whole_job_threshold_secs: u64,
    /// Chunk length (seconds) when no target worker count is set and the
    /// primary engine's profile does not chunk.
    pub default_chunk_secs: u64,
    /// Upper bound on adaptive chunk length (seconds).
    pub max_chunk_secs: u64,
    /// Completed jobs older than this are removed by the cleanup sweep.
    pub cleanup_after_minutes: u64,
    /// Period of the cleanup sweep in seconds.
    pub cleanup_interval_secs: u64,
    /// Whether the cleanup sweep deletes anything.
    pub auto_cleanup: bool,
    /// Minimum interval between progress callbacks in milliseconds.
    pub progress_interval_ms: u64,
    /// Command used to read a source's duration.
    pub probe_command: String,
    /// When set, chunk size is derived so that about this many workers are kept busy.
    #[serde(default)]
    pub target_workers: Option<usize>,
    /// Directory for merged transcripts (None = XDG data dir).
    #[serde(default)]
    pub transcript_dir: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// External command engines, in no particular order (the chain is ordered by rank).
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 10,
            max_concurrent_jobs: 3,
            whole_job_threshold_secs: 600,
            default_chunk_secs: 300,
            max_chunk_secs: 1200,
            cleanup_after_minutes: 30,
            cleanup_interval_secs: 30,
            auto_cleanup: true,
            progress_interval_ms: 100,
            probe_command: "ffprobe".to_string(),
            target_workers: None,
            transcript_dir: None,
            retry: None,
            engines: Vec::new(),
        }
    }
}

impl ScribeConfig {
    pub fn worker_bounds(&self) -> WorkerBounds {
        WorkerBounds::new(self.min_workers, self.max_workers)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(|r| RetryPolicy {
                max_retries: r.max_retries,
                base_delay_secs: r.base_delay_secs,
                max_delay: Duration::from_secs(r.max_delay_secs),
            })
            .unwrap_or_default()
    }

    pub fn fallback_settings(&self) -> FallbackSettings {
        FallbackSettings {
            retry: self.retry_policy(),
            bounds: self.worker_bounds(),
            whole_job_threshold_secs: self.whole_job_threshold_secs as f64,
            default_chunk_secs: self.default_chunk_secs,
            max_chunk_secs: self.max_chunk_secs,
            target_workers: self.target_workers,
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            available_memory: None,
        }
    }

    /// Scheduler settings; `transcript_dir` falls back to the XDG data dir.
    pub fn scheduler_config(&self) -> Result<SchedulerConfig> {
        let transcript_dir = match &self.transcript_dir {
            Some(dir) => dir.clone(),
            None => default_transcript_dir()?,
        };
        Ok(SchedulerConfig {
            max_concurrent_jobs: self.max_concurrent_jobs,
            cleanup_after: Duration::from_secs(self.cleanup_after_minutes * 60),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs.max(1)),
            auto_cleanup: self.auto_cleanup,
            transcript_dir,
        })
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("scribe")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// `~/.local/share/scribe/transcripts`.
pub fn default_transcript_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("scribe")?;
    Ok(xdg_dirs.get_data_home().join("scribe").join("transcripts"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ScribeConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ScribeConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ScribeConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ScribeConfig::default();
        assert_eq!(cfg.min_workers, 1);
        assert_eq!(cfg.max_workers, 10);
        assert_eq!(cfg.max_concurrent_jobs, 3);
        assert_eq!(cfg.whole_job_threshold_secs, 600);
        assert_eq!(cfg.cleanup_after_minutes, 30);
        assert!(cfg.auto_cleanup);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ScribeConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ScribeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_workers, cfg.max_workers);
        assert_eq!(parsed.default_chunk_secs, cfg.default_chunk_secs);
        assert_eq!(parsed.probe_command, cfg.probe_command);
        assert!(parsed.engines.is_empty());
    }

    #[test]
    fn config_toml_retry_and_engines() {
        let toml = r#"
            min_workers = 2
            max_workers = 6
            max_concurrent_jobs = 1
            whole_job_threshold_secs = 300
            default_chunk_secs = 120
            max_chunk_secs = 900
            cleanup_after_minutes = 5
            cleanup_interval_secs = 10
            auto_cleanup = false
            progress_interval_ms = 250
            probe_command = "/usr/bin/ffprobe"

            [retry]
            max_retries = 2
            base_delay_secs = 1.5
            max_delay_secs = 20

            [[engines]]
            name = "whisper-cpp"
            quality_rank = 0
            command = ["whisper-cli", "-f", "{input}", "--offset-t", "{start}"]
            requires_resource = "/models/ggml-large-v3.bin"

            [[engines]]
            name = "youtube-transcript-api"
            quality_rank = 2
            command = ["yt-transcript", "{input}"]
            supports_chunking = false
        "#;
        let cfg: ScribeConfig = toml::from_str(toml).unwrap();
        assert!(!cfg.auto_cleanup);
        assert_eq!(cfg.engines.len(), 2);
        assert!(cfg.engines[0].supports_chunking);
        assert!(!cfg.engines[1].supports_chunking);
        assert_eq!(
            cfg.engines[0].requires_resource.as_deref(),
            Some(std::path::Path::new("/models/ggml-large-v3.bin"))
        );

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert!((policy.base_delay_secs - 1.5).abs() < 1e-9);
        assert_eq!(policy.max_delay, Duration::from_secs(20));

        let bounds = cfg.worker_bounds();
        assert_eq!((bounds.min, bounds.max), (2, 6));
    }

    #[test]
    fn missing_retry_section_uses_defaults() {
        let cfg = ScribeConfig::default();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert!((policy.base_delay_secs - 2.0).abs() < 1e-9);
    }
}
