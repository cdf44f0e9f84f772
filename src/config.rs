//! Configuration for StashKV
//!
//! The store recognises only a file path and two advisory interval hints.
//! The hints are read by [`MaintenanceWorker`](crate::maintenance::MaintenanceWorker);
//! the engine itself schedules nothing.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StashError};

/// Main configuration for a StashKV store
#[derive(Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// The single store file (header + record stream).
    /// Compaction writes a `<file>.compact` sibling next to it.
    pub path: PathBuf,

    // -------------------------------------------------------------------------
    // Maintenance Hints
    // -------------------------------------------------------------------------
    /// How often an external timer should call `cleanup()`
    pub cleanup_interval: Option<Duration>,

    /// How often an external timer should call `compact()`
    pub compaction_interval: Option<Duration>,

    // -------------------------------------------------------------------------
    // Time Source
    // -------------------------------------------------------------------------
    /// Clock used for record timestamps and expiry checks
    pub clock: Arc<dyn Clock>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./stash.db"),
            cleanup_interval: None,
            compaction_interval: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("cleanup_interval", &self.cleanup_interval)
            .field("compaction_interval", &self.compaction_interval)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Config for the given store file, everything else default
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(StashError::Config("store path is empty".to_string()));
        }
        if self.cleanup_interval == Some(Duration::ZERO) {
            return Err(StashError::Config(
                "cleanup interval must be non-zero".to_string(),
            ));
        }
        if self.compaction_interval == Some(Duration::ZERO) {
            return Err(StashError::Config(
                "compaction interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the advisory cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = Some(interval);
        self
    }

    /// Set the advisory compaction interval
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = Some(interval);
        self
    }

    /// Use a custom clock (e.g. `ManualClock` in tests)
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.config.clock = Arc::new(clock);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
