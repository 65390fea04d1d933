use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration for the modex host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base directory holding the registry document and all environments.
    pub home: PathBuf,

    /// Interpreter used to create new environments.
    pub python: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: paths::default_home(),
            python: paths::default_python(),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config rooted at the given base directory.
    #[must_use]
    pub fn new(home: PathBuf) -> Self {
        Self {
            home,
            ..Default::default()
        }
    }

    /// Set the base interpreter.
    #[must_use]
    pub fn with_python(mut self, python: PathBuf) -> Self {
        self.python = python;
        self
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Path of the registry document.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        paths::registry_path(&self.home)
    }
}
