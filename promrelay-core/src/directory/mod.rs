//! Target directory: the read-only name → target mapping
//!
//! A [`TargetDirectory`] is an immutable snapshot built from one
//! configuration load. The [`DirectoryHandle`] owns the current snapshot and
//! swaps in a complete new one on reload, so concurrent readers see either
//! the old directory or the new one, never a mix.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use crate::config::{self, ConfigError, ConfigResult};
use crate::models::Target;
use crate::vault::Vault;

/// Immutable snapshot of all configured targets
#[derive(Debug)]
pub struct TargetDirectory {
    targets: HashMap<String, Arc<Target>>,
    version: u64,
    source: Option<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl TargetDirectory {
    /// Builds a directory from a list of targets
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateTarget` if two targets share a name.
    pub fn from_targets(targets: Vec<Target>, source: Option<PathBuf>) -> ConfigResult<Self> {
        let mut map = HashMap::with_capacity(targets.len());
        for target in targets {
            let name = target.name.clone();
            if map.insert(name.clone(), Arc::new(target)).is_some() {
                return Err(ConfigError::DuplicateTarget(name));
            }
        }

        Ok(Self {
            targets: map,
            version: 0,
            source,
            loaded_at: Utc::now(),
        })
    }

    /// Creates a directory with no targets
    #[must_use]
    pub fn empty() -> Self {
        Self {
            targets: HashMap::new(),
            version: 0,
            source: None,
            loaded_at: Utc::now(),
        }
    }

    /// Looks up a target by its exact name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<Target>> {
        self.targets.get(name).cloned()
    }

    /// Returns all target names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.targets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of targets
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if no targets are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Snapshot version, incremented by every successful swap
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Configuration file this snapshot was loaded from
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// When this snapshot was built
    #[must_use]
    pub const fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Shared owner of the current directory snapshot
#[derive(Debug)]
pub struct DirectoryHandle {
    current: ArcSwap<TargetDirectory>,
    /// Next version to assign; held across the store so versions only grow
    next_version: Mutex<u64>,
}

impl DirectoryHandle {
    /// Creates a handle serving `directory` as version 1
    #[must_use]
    pub fn new(mut directory: TargetDirectory) -> Self {
        directory.version = 1;
        Self {
            current: ArcSwap::from_pointee(directory),
            next_version: Mutex::new(2),
        }
    }

    /// Returns the current snapshot
    ///
    /// The snapshot stays valid for as long as the caller holds it, even if a
    /// reload happens meanwhile.
    #[must_use]
    pub fn snapshot(&self) -> Arc<TargetDirectory> {
        self.current.load_full()
    }

    /// Replaces the current snapshot and returns the new version
    pub fn replace(&self, mut directory: TargetDirectory) -> u64 {
        let mut next = self
            .next_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let version = *next;
        *next += 1;
        directory.version = version;
        self.current.store(Arc::new(directory));
        version
    }

    /// Reloads the configuration from `path` and swaps it in
    ///
    /// On failure the current snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` that prevented the load.
    pub fn reload(&self, path: &Path, vault: &Vault) -> ConfigResult<u64> {
        let directory = config::load_file(path, vault)?;
        let count = directory.len();
        let version = self.replace(directory);
        tracing::info!(
            path = %path.display(),
            targets = count,
            version,
            "Configuration reloaded"
        );
        Ok(version)
    }
}
