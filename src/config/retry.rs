use std::time::Duration;

use config::ConfigError;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Shape of the delay between two purge attempts
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Always `base_delay_ms`
    Fixed,
    /// `base_delay_ms * 2^(attempt - 1)`, capped at `max_delay_ms`
    #[default]
    Exponential,
}

/// Retry policy applied to every purge batch
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Total upstream calls per batch, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Fraction of each delay that may be randomly shaved off (0.0 disables jitter)
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Single upstream call timeout (unit: milliseconds)
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(ConfigError::Message(
                "retry.max_attempts must be at least 1".into(),
            )));
        }

        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "retry.base_delay_ms must be at least 1ms".into(),
            )));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.max_delay_ms ({}) must not be smaller than retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ))));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.jitter must be within 0.0..=1.0, got {}",
                self.jitter
            ))));
        }

        if self.attempt_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "retry.attempt_timeout_ms must be at least 1ms".into(),
            )));
        }

        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Un-jittered delay to wait after the `attempt`-th failure (1-based).
    pub fn base_delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        let ms = match self.backoff {
            BackoffKind::Fixed => self.base_delay_ms,
            BackoffKind::Exponential => {
                let shift = attempt.saturating_sub(1).min(32) as u32;
                self.base_delay_ms.saturating_mul(1u64 << shift)
            }
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }

    /// Delay to wait after the `attempt`-th failure, with jitter applied.
    ///
    /// Jitter only ever shortens the delay, so the result stays within
    /// `[base * (1 - jitter), base]`.
    pub fn delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        let base = self.base_delay_for(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let shave = rand::thread_rng().gen_range(0.0..=self.jitter);
        base.mul_f64(1.0 - shave)
    }
}

fn default_max_attempts() -> usize {
    4
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_jitter() -> f64 {
    0.2
}
fn default_attempt_timeout_ms() -> u64 {
    10_000
}
