//! Storage layer for worklog
//!
//! All tracker state lives in a single JSON document guarded by an advisory
//! file lock. Every mutating command runs as one transaction: acquire the
//! lock, read, mutate in memory, write atomically, release.
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   .worklog.toml               # Optional configuration
//!   .worklog/
//!     state.json                # Users, projects, tasks, time entries
//!     state.lock                # Advisory lock for state.json
//!     actor                     # Persisted actor identity
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE;
use crate::error::{Error, Result};
use crate::lock::{self, StateLock};
use crate::state::{State, SCHEMA_VERSION};

/// Name of the state directory at the tracker root
pub const STATE_DIR: &str = ".worklog";

/// Storage manager for worklog state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Find the nearest ancestor of `start` (inclusive) holding a `.worklog/` directory
    pub fn discover(start: &Path) -> Result<Self> {
        for dir in start.ancestors() {
            if dir.join(STATE_DIR).is_dir() {
                return Ok(Self::new(dir.to_path_buf()));
            }
        }
        Err(Error::NotInitialized(start.to_path_buf()))
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir().join("state.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_dir().join("state.lock")
    }

    pub fn actor_file(&self) -> PathBuf {
        self.state_dir().join("actor")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn is_initialized(&self) -> bool {
        self.state_file().exists()
    }

    // =========================================================================
    // State access
    // =========================================================================

    /// Create the state directory and write the initial state.
    pub fn init(&self, state: &State) -> Result<()> {
        fs::create_dir_all(self.state_dir())?;
        let _lock = StateLock::acquire(self.lock_file(), lock::DEFAULT_LOCK_TIMEOUT_MS)?;
        if self.is_initialized() {
            return Err(Error::InvalidArgument(format!(
                "worklog already initialized at {}",
                self.root.display()
            )));
        }
        self.write_state(state)
    }

    /// Read a consistent snapshot of the state.
    pub fn load(&self, timeout_ms: u64) -> Result<State> {
        self.ensure_initialized()?;
        let _lock = StateLock::acquire(self.lock_file(), timeout_ms)?;
        self.read_state()
    }

    /// Run `f` against the state under the exclusive lock.
    ///
    /// The state is written back only when `f` returns `Ok`; on error nothing
    /// is persisted.
    pub fn transaction<T, F>(&self, timeout_ms: u64, f: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> Result<T>,
    {
        self.ensure_initialized()?;
        let _lock = StateLock::acquire(self.lock_file(), timeout_ms)?;

        let mut state = self.read_state()?;
        let result = f(&mut state)?;
        self.write_state(&state)?;
        Ok(result)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized(self.root.clone()))
        }
    }

    fn read_state(&self) -> Result<State> {
        let content = fs::read_to_string(self.state_file())?;
        let state: State = serde_json::from_str(&content)?;
        if state.schema_version != SCHEMA_VERSION {
            return Err(Error::DataIntegrity(format!(
                "unsupported state schema '{}' (expected '{SCHEMA_VERSION}')",
                state.schema_version
            )));
        }
        Ok(state)
    }

    fn write_state(&self, state: &State) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        lock::write_atomic(self.state_file(), json.as_bytes())
    }
}
