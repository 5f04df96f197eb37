use std::net::SocketAddr;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DrainConfig {
    /// Hard upper bound on shutdown drain wall-clock time (milliseconds)
    #[serde(default = "default_drain_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_drain_deadline_ms(),
        }
    }
}

impl DrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.deadline_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "drain.deadline_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the HTTP intake endpoint binds to
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// How long a blocked intake request may wait for queue space (milliseconds)
    #[serde(default = "default_intake_timeout_ms")]
    pub intake_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            intake_timeout_ms: default_intake_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.intake_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "server.intake_timeout_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "server.listen_address {:?} is not a socket address: {}",
                self.listen_address, e
            )))
        })
    }

    pub fn intake_timeout(&self) -> Duration {
        Duration::from_millis(self.intake_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_enabled: bool,

    /// 0 binds an ephemeral port
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            prometheus_port: default_prometheus_port(),
        }
    }
}

fn default_drain_deadline_ms() -> u64 {
    30_000
}
fn default_listen_address() -> String {
    "127.0.0.1:9199".to_string()
}
// in ms
fn default_intake_timeout_ms() -> u64 {
    5_000
}
fn default_prometheus_port() -> u16 {
    9090
}
