//! Host state owned by the session loop.

use modex_core::{Config, ProcessRunner, Registry, Result};

/// The registry and process runner a session dispatches against.
///
/// Owned by the session loop and lent to the dispatcher per request; there
/// is no ambient state.
#[derive(Debug)]
pub struct HostState {
    pub registry: Registry,
    pub runner: ProcessRunner,
}

impl HostState {
    #[must_use]
    pub fn new(registry: Registry, runner: ProcessRunner) -> Self {
        Self { registry, runner }
    }

    /// Load the registry under `config.home` and spawn real collaborators.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Registry::load(&config.home)?;
        let runner = ProcessRunner::new(config.python.clone());
        Ok(Self::new(registry, runner))
    }
}
