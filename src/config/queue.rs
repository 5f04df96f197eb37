use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Maximum number of concurrent purge workers accepted by validation
pub const MAX_WORKER_COUNT: usize = 64;

/// What a producer experiences when the queue is at capacity
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntakeMode {
    /// Wait for space, bounded by the caller's cancellation token
    #[default]
    Blocking,
    /// Fail fast with a backpressure error
    Rejecting,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// Maximum number of buffered (not yet dequeued) batches
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub intake_mode: IntakeMode,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            intake_mode: IntakeMode::default(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "queue.capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkersConfig {
    /// Number of concurrent consumer loops
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

impl WorkersConfig {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 || self.count > MAX_WORKER_COUNT {
            return Err(Error::Config(ConfigError::Message(format!(
                "workers.count must be between 1 and {MAX_WORKER_COUNT}, got {}",
                self.count
            ))));
        }
        Ok(())
    }
}

fn default_capacity() -> usize {
    10_000
}
fn default_worker_count() -> usize {
    4
}
