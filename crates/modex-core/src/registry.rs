//! Environment registry.
//!
//! The registry owns the ordered list of known environments and its durable
//! copy, a JSON array at `<home>/venvs.json`. Every mutation is written through
//! before it is reported, so the document always matches memory after an
//! operation returns.

use crate::error::{Error, Result};
use crate::paths;
use modex_proto::InstalledPackage;
use modex_util::fs::atomic_write;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One isolated package environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Unique, assigned as `max(existing) + 1`.
    pub id: u64,
    /// Display name; not required to be unique.
    pub name: String,
    /// Absolute location; unique.
    pub path: PathBuf,
    /// At most one environment is active at a time.
    pub is_active: bool,
    /// Packages installed through the host, one entry per name.
    #[serde(default)]
    pub packages: Vec<InstalledPackage>,
}

/// The environment list plus its persisted document.
#[derive(Debug)]
pub struct Registry {
    home: PathBuf,
    document: PathBuf,
    environments: Vec<Environment>,
}

impl Registry {
    /// Load the registry for a base directory.
    ///
    /// Creates the base directory and an empty document if they are missing.
    /// A relative `home` is resolved against the current directory once, here,
    /// so every stored environment path is absolute.
    pub fn load(home: &Path) -> Result<Self> {
        std::fs::create_dir_all(home)?;
        let home = dunce::canonicalize(home)?;
        let document = paths::registry_path(&home);

        let environments = if document.exists() {
            let bytes = std::fs::read(&document).map_err(|source| Error::RegistryRead {
                path: document.clone(),
                source,
            })?;
            serde_json::from_slice(&bytes).map_err(|source| Error::RegistryParse {
                path: document.clone(),
                source,
            })?
        } else {
            atomic_write(&document, b"[]")?;
            info!(path = %document.display(), "created empty registry");
            Vec::new()
        };

        let registry = Self {
            home,
            document,
            environments,
        };
        debug!(
            count = registry.environments.len(),
            active = ?registry.active().map(|e| e.id),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Base directory environments are created under.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Location of the persisted document.
    #[must_use]
    pub fn document_path(&self) -> &Path {
        &self.document
    }

    /// All environments in creation order.
    #[must_use]
    pub fn list(&self) -> &[Environment] {
        &self.environments
    }

    #[must_use]
    pub fn environment(&self, id: u64) -> Option<&Environment> {
        self.environments.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn active(&self) -> Option<&Environment> {
        self.environments.iter().find(|e| e.is_active)
    }

    /// Path of the active environment.
    pub fn active_environment_path(&self) -> Result<&Path> {
        self.active()
            .map(|e| e.path.as_path())
            .ok_or(Error::NoActiveEnvironment)
    }

    /// The active environment, or `NoActiveEnvironment`.
    pub fn active_environment(&self) -> Result<&Environment> {
        self.active().ok_or(Error::NoActiveEnvironment)
    }

    /// Create an environment at `home/relative` and register it.
    ///
    /// `create_env` materializes the environment on disk. If it fails, or the
    /// document cannot be written, the registry is left unchanged.
    pub fn create<F>(&mut self, name: &str, relative: &str, create_env: F) -> Result<Environment>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        if name.trim().is_empty() {
            return Err(Error::invalid_name("environment name", name));
        }
        let path = paths::environment_path(&self.home, relative)?;
        if path.exists() {
            return Err(Error::AlreadyExists { path });
        }

        create_env(&path)?;

        let environment = Environment {
            id: self.next_id(),
            name: name.to_string(),
            path,
            is_active: self.environments.is_empty(),
            packages: Vec::new(),
        };

        let mut next = self.environments.clone();
        next.push(environment.clone());
        self.commit(next)?;

        info!(
            id = environment.id,
            path = %environment.path.display(),
            active = environment.is_active,
            "environment created"
        );
        Ok(environment)
    }

    /// Make `id` the only active environment.
    ///
    /// Unknown ids are rejected without touching any flags.
    pub fn set_active(&mut self, id: u64) -> Result<()> {
        if self.environment(id).is_none() {
            return Err(Error::EnvironmentNotFound { id });
        }

        let next = self
            .environments
            .iter()
            .cloned()
            .map(|mut e| {
                e.is_active = e.id == id;
                e
            })
            .collect();
        self.commit(next)?;

        info!(id, "environment activated");
        Ok(())
    }

    /// Record a successful install into environment `id`.
    ///
    /// A package already listed under the same name (ignoring ASCII case) has
    /// its version replaced; otherwise the package is appended.
    pub fn record_package(&mut self, id: u64, package: InstalledPackage) -> Result<()> {
        if self.environment(id).is_none() {
            return Err(Error::EnvironmentNotFound { id });
        }

        let mut next = self.environments.clone();
        if let Some(env) = next.iter_mut().find(|e| e.id == id) {
            match env
                .packages
                .iter_mut()
                .find(|p| p.name.eq_ignore_ascii_case(&package.name))
            {
                Some(existing) => *existing = package.clone(),
                None => env.packages.push(package.clone()),
            }
        }
        self.commit(next)?;

        info!(id, name = %package.name, version = %package.version, "package recorded");
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.environments.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }

    /// Persist `next`, then adopt it as the in-memory state.
    fn commit(&mut self, next: Vec<Environment>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&next)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        atomic_write(&self.document, &bytes)?;
        self.environments = next;
        Ok(())
    }
}
