//! Engine contract: the pluggable backends that turn media into text.
//!
//! An engine is described by an [`EngineDescriptor`] (name, quality rank,
//! capability flags) and implements [`Engine::process`] for one [`WorkUnit`],
//! which is either the whole source or a time span of it.

mod command;
mod profile;
mod registry;

pub use command::CommandEngine;
pub use profile::{resolve_alias, EngineProfile, DEFAULT_CHUNK_SECS, DEFAULT_MEMORY_PER_WORKER_GB};
pub use registry::EngineRegistry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::planner::ChunkSpan;
use crate::retry::EngineError;

/// Free-form per-job options passed through to engines (language, prompt, ...).
pub type JobOptions = BTreeMap<String, String>;

/// Static description of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDescriptor {
    pub name: String,
    /// Lower rank = higher quality.
    pub quality_rank: u8,
    /// Engine can process a time span of the input rather than only the whole input.
    pub supports_chunking: bool,
    /// Engine needs an external resource (model file, API key) to be present.
    pub requires_resource: bool,
}

impl EngineDescriptor {
    pub fn new(name: impl Into<String>, quality_rank: u8) -> Self {
        Self {
            name: name.into(),
            quality_rank,
            supports_chunking: true,
            requires_resource: false,
        }
    }

    pub fn whole_only(mut self) -> Self {
        self.supports_chunking = false;
        self
    }

    pub fn with_resource(mut self) -> Self {
        self.requires_resource = true;
        self
    }

    pub fn quality(&self) -> QualityLevel {
        QualityLevel::from_rank(self.quality_rank)
    }
}

/// Quality of the text a chunk ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    High,
    Medium,
    Low,
    Failed,
}

impl QualityLevel {
    pub fn from_rank(rank: u8) -> Self {
        match rank {
            0 => QualityLevel::High,
            1 => QualityLevel::Medium,
            _ => QualityLevel::Low,
        }
    }

    /// Weight used in the quality score.
    pub fn weight(self) -> u32 {
        match self {
            QualityLevel::High => 100,
            QualityLevel::Medium => 70,
            QualityLevel::Low => 40,
            QualityLevel::Failed => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLevel::High => "high",
            QualityLevel::Medium => "medium",
            QualityLevel::Low => "low",
            QualityLevel::Failed => "failed",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an engine is asked to process: a source reference and an optional span.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub source: String,
    /// `None` = the whole input.
    pub span: Option<ChunkSpan>,
}

impl WorkUnit {
    pub fn whole(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            span: None,
        }
    }

    pub fn chunk(source: impl Into<String>, span: ChunkSpan) -> Self {
        Self {
            source: source.into(),
            span: Some(span),
        }
    }
}

/// A text-producing backend.
///
/// Implementations block for the duration of the call; they run on chunk
/// worker threads. `progress` accepts a percent in `0..=100` within the unit
/// and may be ignored by engines without an intermediate signal.
pub trait Engine: Send + Sync {
    fn descriptor(&self) -> &EngineDescriptor;

    /// Whether the engine is configured and reachable right now.
    fn available(&self) -> bool;

    fn supports_chunking(&self) -> bool {
        self.descriptor().supports_chunking
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn process(
        &self,
        unit: &WorkUnit,
        options: &JobOptions,
        progress: &dyn Fn(f64),
    ) -> Result<String, EngineError>;
}
