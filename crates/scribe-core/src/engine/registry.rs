use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ScribeConfig;
use crate::engine::command::CommandEngine;
use crate::engine::profile::{resolve_alias, EngineProfile};
use crate::engine::Engine;

struct Registered {
    engine: Arc<dyn Engine>,
    profile: EngineProfile,
}

/// Named set of engines available to jobs, each with its allocation profile.
#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Registered>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the `[[engines]]` command engines from config.
    pub fn from_config(cfg: &ScribeConfig) -> Self {
        let mut registry = Self::new();
        for ec in &cfg.engines {
            let mut profile = EngineProfile::builtin(&ec.name);
            if let Some(secs) = ec.chunk_secs {
                profile = profile.with_chunk_secs(secs);
            }
            if let Some(gb) = ec.memory_per_worker_gb {
                profile = profile.with_memory_per_worker_gb(gb);
            }
            registry.register_with_profile(Arc::new(CommandEngine::from_config(ec)), profile);
        }
        registry
    }

    /// Register an engine with its built-in profile. Replaces an engine of the same name.
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        let profile = EngineProfile::builtin(engine.name());
        self.register_with_profile(engine, profile);
    }

    pub fn register_with_profile(&mut self, engine: Arc<dyn Engine>, profile: EngineProfile) {
        let name = engine.name().to_string();
        self.engines.insert(name, Registered { engine, profile });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.lookup(name).map(|r| Arc::clone(&r.engine))
    }

    pub fn profile(&self, name: &str) -> Option<&EngineProfile> {
        self.lookup(name).map(|r| &r.profile)
    }

    /// All registered names, highest quality first.
    pub fn names(&self) -> Vec<String> {
        let mut all: Vec<&Registered> = self.engines.values().collect();
        all.sort_by(|a, b| {
            a.engine
                .descriptor()
                .quality_rank
                .cmp(&b.engine.descriptor().quality_rank)
                .then_with(|| a.engine.name().cmp(b.engine.name()))
        });
        all.iter().map(|r| r.engine.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Resolve a job's engine preference into engines, in the given order.
    /// An empty preference means every registered engine, highest quality first.
    pub fn chain_for(&self, names: &[String]) -> Result<Vec<Arc<dyn Engine>>> {
        if names.is_empty() {
            return Ok(self
                .names()
                .iter()
                .filter_map(|n| self.get(n))
                .collect());
        }
        let mut chain = Vec::with_capacity(names.len());
        for name in names {
            match self.get(name) {
                Some(engine) => {
                    if !chain.iter().any(|e: &Arc<dyn Engine>| e.name() == engine.name()) {
                        chain.push(engine);
                    }
                }
                None => bail!("unknown engine: {}", name),
            }
        }
        Ok(chain)
    }

    fn lookup(&self, name: &str) -> Option<&Registered> {
        self.engines
            .get(name)
            .or_else(|| self.engines.get(resolve_alias(name)))
    }
}
