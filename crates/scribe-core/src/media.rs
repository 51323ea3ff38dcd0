//! Media duration probing.

use anyhow::{bail, Context, Result};
use std::process::Command;

/// Reports the duration of a source before it is planned.
pub trait MediaSource: Send + Sync {
    fn duration_secs(&self, source_ref: &str) -> Result<f64>;
}

/// Reads the container duration with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeSource {
    command: String,
}

impl FfprobeSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for FfprobeSource {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaSource for FfprobeSource {
    fn duration_secs(&self, source_ref: &str) -> Result<f64> {
        let output = Command::new(&self.command)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "csv=p=0",
                source_ref,
            ])
            .output()
            .with_context(|| format!("running {}", self.command))?;
        if !output.status.success() {
            bail!(
                "{} failed for {}: {}",
                self.command,
                source_ref,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        parse_duration(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("probing duration of {}", source_ref))
    }
}

fn parse_duration(stdout: &str) -> Result<f64> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let secs: f64 = line
        .parse()
        .with_context(|| format!("unexpected probe output: {:?}", line))?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("invalid duration: {}", secs);
    }
    Ok(secs)
}
