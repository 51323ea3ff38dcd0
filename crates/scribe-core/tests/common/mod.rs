//! Fakes shared by the integration tests: scripted engines and a fixed-duration media source.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scribe_core::engine::{Engine, EngineDescriptor, JobOptions, WorkUnit};
use scribe_core::media::MediaSource;
use scribe_core::retry::EngineError;

type Script = Box<dyn Fn(&WorkUnit) -> Result<String, EngineError> + Send + Sync>;

/// Engine whose output is computed from the work unit.
pub struct FakeEngine {
    desc: EngineDescriptor,
    script: Script,
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new(
        desc: EngineDescriptor,
        script: impl Fn(&WorkUnit) -> Result<String, EngineError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            desc,
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    /// Returns `"<name> <start>-<end>"` for every unit.
    pub fn echo(desc: EngineDescriptor) -> Arc<Self> {
        let name = desc.name.clone();
        Self::new(desc, move |unit| Ok(label(&name, unit)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn label(engine: &str, unit: &WorkUnit) -> String {
    match unit.span {
        Some(span) => format!("{} {}-{}", engine, span.start_secs, span.end_secs),
        None => format!("{} whole", engine),
    }
}

impl Engine for FakeEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.desc
    }

    fn available(&self) -> bool {
        true
    }

    fn process(&self, unit: &WorkUnit, _options: &JobOptions, progress: &dyn Fn(f64)) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress(50.0);
        (self.script)(unit)
    }
}

/// Durations keyed by source reference; unknown sources fail to probe.
#[derive(Default)]
pub struct FixedDurations(pub HashMap<String, f64>);

impl FixedDurations {
    pub fn with(mut self, source: &str, secs: f64) -> Self {
        self.0.insert(source.to_string(), secs);
        self
    }
}

impl MediaSource for FixedDurations {
    fn duration_secs(&self, source_ref: &str) -> Result<f64> {
        self.0
            .get(source_ref)
            .copied()
            .ok_or_else(|| anyhow!("cannot probe {}", source_ref))
    }
}
