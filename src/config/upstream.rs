use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// CDN network the purge applies to
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurgeNetwork {
    #[default]
    Staging,
    Production,
}

impl PurgeNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeNetwork::Staging => "staging",
            PurgeNetwork::Production => "production",
        }
    }
}

/// How the CDN should treat the cached object
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurgeAction {
    /// Remove the object from cache
    #[default]
    Delete,
    /// Mark the object stale, forcing revalidation
    Invalidate,
}

impl PurgeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeAction::Delete => "delete",
            PurgeAction::Invalidate => "invalidate",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Equivalent purge API base URLs, rotated round-robin per attempt
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    #[serde(default)]
    pub network: PurgeNetwork,

    #[serde(default)]
    pub action: PurgeAction,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            network: PurgeNetwork::default(),
            action: PurgeAction::default(),
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "upstream.targets must contain at least one purge endpoint".into(),
            )));
        }

        for target in &self.targets {
            if !(target.starts_with("http://") || target.starts_with("https://")) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "upstream target {target:?} must be an http(s) URL"
                ))));
            }
        }

        Ok(())
    }
}

fn default_targets() -> Vec<String> {
    vec!["http://localhost:6889".to_string()]
}
