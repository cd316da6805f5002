//! Tunable engine parameters.

use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::core::counter::DEFAULT_HISTORY;
use crate::core::MarsError;

/// Engine configuration. Every field has a default, so a JSON file only
/// needs to name the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarsConfig {
    /// Number of memory cells.
    pub memory_size: usize,
    /// Maximum number of programs loaded at once.
    pub max_programs: usize,
    /// Cells reserved on each side of a loaded program.
    pub buffer: usize,
    /// Rounds run when no explicit budget is given.
    pub max_rounds: u64,
    /// A contest stops once fewer than this many programs survive.
    pub min_survivors: usize,
    /// Addresses remembered per program counter.
    pub history_size: usize,
    /// Seed for random placement; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl MarsConfig {
    /// Read a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MarsError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MarsError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        let config: MarsConfig = serde_json::from_str(&text)
            .map_err(|e| MarsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Largest program the engine will accept.
    pub fn max_program_size(&self) -> usize {
        self.memory_size / 4
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), MarsError> {
        if self.memory_size == 0 {
            return Err(MarsError::Config("memory_size must be positive".into()));
        }
        if self.max_programs == 0 {
            return Err(MarsError::Config("max_programs must be positive".into()));
        }
        if self.min_survivors == 0 {
            return Err(MarsError::Config("min_survivors must be positive".into()));
        }
        Ok(())
    }
}

impl Default for MarsConfig {
    fn default() -> Self {
        Self {
            memory_size: 4096,
            max_programs: 3,
            buffer: 100,
            max_rounds: 1000,
            min_survivors: 2,
            history_size: DEFAULT_HISTORY,
            seed: None,
        }
    }
}
