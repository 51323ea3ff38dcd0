//! Per-engine chunk length and memory policy used by worker allocation.

/// Chunk length for engines missing from the built-in table.
pub const DEFAULT_CHUNK_SECS: u64 = 600;
/// Per-worker memory estimate for engines missing from the built-in table.
pub const DEFAULT_MEMORY_PER_WORKER_GB: f64 = 1.0;

const BUILTIN: &[(&str, u64, f64)] = &[
    ("whisper-cpp", 300, 2.5),
    ("whisper-api", 600, 0.1),
    ("gpt-4o-transcribe", 600, 0.1),
    ("gpt-4o-mini-transcribe", 600, 0.1),
    ("youtube-transcript-api", 0, 0.05),
];

const ALIASES: &[(&str, &str)] = &[
    ("high", "gpt-4o-transcribe"),
    ("medium", "gpt-4o-mini-transcribe"),
    ("whisper-cloud", "whisper-api"),
    ("whisper-local", "whisper-cpp"),
    ("youtube", "youtube-transcript-api"),
];

/// Map a short engine alias to its canonical name; other names pass through.
pub fn resolve_alias(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Chunking and memory characteristics of one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProfile {
    pub name: String,
    /// Fixed chunk length in seconds; 0 = engine does not chunk.
    pub chunk_secs: u64,
    pub memory_per_worker_gb: f64,
}

impl EngineProfile {
    /// Built-in profile for `name` (aliases resolved), or the defaults.
    pub fn builtin(name: &str) -> Self {
        let canonical = resolve_alias(name);
        match BUILTIN.iter().find(|(n, _, _)| *n == canonical) {
            Some((n, chunk, mem)) => Self {
                name: (*n).to_string(),
                chunk_secs: *chunk,
                memory_per_worker_gb: *mem,
            },
            None => Self {
                name: canonical.to_string(),
                chunk_secs: DEFAULT_CHUNK_SECS,
                memory_per_worker_gb: DEFAULT_MEMORY_PER_WORKER_GB,
            },
        }
    }

    pub fn with_chunk_secs(mut self, chunk_secs: u64) -> Self {
        self.chunk_secs = chunk_secs;
        self
    }

    pub fn with_memory_per_worker_gb(mut self, gb: f64) -> Self {
        self.memory_per_worker_gb = gb;
        self
    }

    pub fn chunks(&self) -> bool {
        self.chunk_secs > 0
    }

    pub fn memory_per_worker_bytes(&self) -> u64 {
        (self.memory_per_worker_gb.max(0.0) * (1u64 << 30) as f64) as u64
    }
}
