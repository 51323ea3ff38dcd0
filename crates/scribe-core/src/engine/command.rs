//! Engine backed by an external command (whisper-cli, an API wrapper script, ...).

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineDescriptor, JobOptions, WorkUnit};
use crate::retry::EngineError;

/// Runs a command template once per work unit and returns its stdout as text.
///
/// Placeholders in arguments: `{input}` (source reference), `{start}`, `{end}`
/// and `{duration}` (seconds, span of the unit; the whole input is `0` to empty).
/// Job options are exported as `SCRIBE_OPT_<KEY>` environment variables.
pub struct CommandEngine {
    descriptor: EngineDescriptor,
    program: String,
    args: Vec<String>,
    resource: Option<PathBuf>,
}

impl CommandEngine {
    pub fn new(descriptor: EngineDescriptor, command: Vec<String>) -> Self {
        let mut parts = command.into_iter();
        let program = parts.next().unwrap_or_default();
        Self {
            descriptor,
            program,
            args: parts.collect(),
            resource: None,
        }
    }

    pub fn with_resource(mut self, path: PathBuf) -> Self {
        self.descriptor.requires_resource = true;
        self.resource = Some(path);
        self
    }

    pub fn from_config(ec: &EngineConfig) -> Self {
        let mut descriptor = EngineDescriptor::new(ec.name.clone(), ec.quality_rank);
        descriptor.supports_chunking = ec.supports_chunking;
        let engine = Self::new(descriptor, ec.command.clone());
        match &ec.requires_resource {
            Some(path) => engine.with_resource(path.clone()),
            None => engine,
        }
    }

    fn render_args(&self, unit: &WorkUnit) -> Vec<String> {
        let (start, end, duration) = match &unit.span {
            Some(span) => (
                format_secs(span.start_secs),
                format_secs(span.end_secs),
                format_secs(span.duration_secs()),
            ),
            None => ("0".to_string(), String::new(), String::new()),
        };
        self.args
            .iter()
            .map(|a| {
                a.replace("{input}", &unit.source)
                    .replace("{start}", &start)
                    .replace("{end}", &end)
                    .replace("{duration}", &duration)
            })
            .collect()
    }
}

fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.3}", secs)
    }
}

fn option_env_key(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("SCRIBE_OPT_{}", sanitized)
}

/// True if `program` is a path to an existing file or is found in `PATH`.
fn resolvable(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if program.contains('/') {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

impl Engine for CommandEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn available(&self) -> bool {
        if !resolvable(&self.program) {
            return false;
        }
        match &self.resource {
            Some(path) => path.exists(),
            None => true,
        }
    }

    fn process(
        &self,
        unit: &WorkUnit,
        options: &JobOptions,
        progress: &dyn Fn(f64),
    ) -> Result<String, EngineError> {
        if unit.span.is_some() && !self.descriptor.supports_chunking {
            return Err(EngineError::Capability(format!(
                "{} only processes whole inputs",
                self.descriptor.name
            )));
        }
        let mut cmd = Command::new(&self.program);
        cmd.args(self.render_args(unit));
        for (k, v) in options {
            cmd.env(option_env_key(k), v);
        }
        tracing::debug!(engine = %self.descriptor.name, program = %self.program, "spawning engine command");
        let output = cmd.output().map_err(|e| match e.kind() {
            IoErrorKind::NotFound | IoErrorKind::PermissionDenied => {
                EngineError::Unavailable(format!("{}: {}", self.program, e))
            }
            _ => EngineError::Opaque(e.to_string()),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let msg = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(EngineError::Opaque(msg));
        }
        progress(100.0);
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ChunkSpan;

    fn sh(script: &str) -> CommandEngine {
        CommandEngine::new(
            EngineDescriptor::new("sh-engine", 0),
            vec!["sh".into(), "-c".into(), script.into(), "engine".into(), "{input}".into(), "{start}".into(), "{end}".into()],
        )
    }

    #[test]
    fn placeholders_are_substituted() {
        let engine = sh("echo \"$1 $2 $3\"");
        let unit = WorkUnit::chunk(
            "talk.mp3",
            ChunkSpan {
                index: 1,
                start_secs: 300.0,
                end_secs: 600.0,
            },
        );
        let text = engine.process(&unit, &JobOptions::new(), &|_| {}).unwrap();
        assert_eq!(text, "talk.mp3 300 600");
    }

    #[test]
    fn options_are_exported() {
        let engine = sh("echo \"$SCRIBE_OPT_LANGUAGE\"");
        let mut opts = JobOptions::new();
        opts.insert("language".into(), "de".into());
        let text = engine.process(&WorkUnit::whole("a.wav"), &opts, &|_| {}).unwrap();
        assert_eq!(text, "de");
    }

    #[test]
    fn failing_command_returns_stderr_for_classification() {
        let engine = sh("echo 'cannot allocate memory' >&2; exit 3");
        let err = engine
            .process(&WorkUnit::whole("a.wav"), &JobOptions::new(), &|_| {})
            .unwrap_err();
        assert!(matches!(err, EngineError::Opaque(ref m) if m.contains("cannot allocate")));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let engine = CommandEngine::new(
            EngineDescriptor::new("ghost", 0),
            vec!["/nonexistent/scribe-ghost-engine".into()],
        );
        assert!(!engine.available());
        let err = engine
            .process(&WorkUnit::whole("a.wav"), &JobOptions::new(), &|_| {})
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[test]
    fn whole_only_engine_rejects_spans() {
        let mut engine = sh("echo x");
        engine.descriptor.supports_chunking = false;
        let unit = WorkUnit::chunk(
            "a.wav",
            ChunkSpan {
                index: 0,
                start_secs: 0.0,
                end_secs: 10.0,
            },
        );
        let err = engine.process(&unit, &JobOptions::new(), &|_| {}).unwrap_err();
        assert!(matches!(err, EngineError::Capability(_)));
    }

    #[test]
    fn missing_resource_makes_engine_unavailable() {
        let engine = sh("echo x").with_resource(PathBuf::from("/nonexistent/model.bin"));
        assert!(!engine.available());
    }
}
