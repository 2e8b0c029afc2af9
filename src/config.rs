use crate::error::{Result, TaarufError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables of the process state machine.
///
/// The escalation and stage thresholds are fixed; only the accrual rate and the
/// number of stages can be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Progress points added for every message sent while in progress.
    pub progress_per_message: u8,
    /// Number of stages a new process runs through.
    pub total_stages: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_per_message: 5,
            total_stages: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(self) -> Result<Self> {
        if !(1..=100).contains(&self.progress_per_message) {
            return Err(TaarufError::ValidationError(format!(
                "progress_per_message must be between 1 and 100, got {}",
                self.progress_per_message
            )));
        }
        if self.total_stages == 0 {
            return Err(TaarufError::ValidationError(
                "total_stages must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// Reads a JSON config file. Missing fields fall back to their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()
    }
}
