//! Node configuration
//!
//! One TOML file describes the whole node: account and feeds, network
//! candidates, broker endpoint, weather provider, sensor thresholds,
//! retry budgets, and the local log file. Everything except credentials
//! has a default, so a minimal config is a handful of lines.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use aeris_core::retry::RetryPolicy;
use aeris_core::supervisor::SupervisorConfig;
use aeris_connectors::mqtt::MqttCredentials;
use aeris_connectors::wifi::NetworkCandidate;

/// Errors loading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read config: {0}")]
    Io(#[from] io::Error),

    /// The file could not be parsed as TOML.
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but a value is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level config file layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Account and cadence.
    pub node: NodeSection,
    /// Wi-Fi candidates.
    #[serde(default)]
    pub network: NetworkSection,
    /// Broker endpoint.
    pub broker: BrokerSection,
    /// External weather provider.
    pub weather: WeatherSection,
    /// Sensor health thresholds.
    #[serde(default)]
    pub sensors: SensorsSection,
    /// Retry budgets.
    #[serde(default)]
    pub retry: RetrySection,
    /// Local rotating log file.
    #[serde(default)]
    pub logfile: Option<LogfileSection>,
    /// Over-the-air updates.
    #[serde(default)]
    pub update: UpdateSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    /// Feed owner; topics are `{user}/feeds/<Name>`.
    pub user: String,
    /// MQTT client identifier.
    pub client_id: String,
    /// Steady-state tick interval in seconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

/// `[network]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSection {
    /// Known networks, joined lowest priority first.
    #[serde(default)]
    pub candidates: Vec<CandidateEntry>,
}

/// One `[[network.candidates]]` entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateEntry {
    /// Network name.
    pub ssid: String,
    /// Pre-shared key.
    pub psk: String,
    /// Join order; lower joins first.
    #[serde(default)]
    pub priority: u32,
}

/// `[broker]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerSection {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Account username.
    pub username: String,
    /// Account key.
    pub key: String,
}

/// `[weather]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherSection {
    /// Provider API key.
    pub api_key: String,
    /// Location latitude.
    pub latitude: f64,
    /// Location longitude.
    pub longitude: f64,
    /// Ticks between fetches.
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_ticks: u32,
}

/// `[sensors]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorsSection {
    /// Consecutive empty reads before a sensor is marked Failed.
    pub max_failures: u32,
    /// Minimum seconds between recovery sweeps.
    pub recovery_cooldown_secs: u64,
}

impl Default for SensorsSection {
    fn default() -> Self {
        Self {
            max_failures: 5,
            recovery_cooldown_secs: 30 * 60,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Boot-time attempts per resource.
    pub setup_attempts: u32,
    /// Boot-time base backoff in seconds.
    pub setup_base_secs: u64,
    /// In-loop reconnect attempts per resource.
    pub reconnect_attempts: u32,
    /// In-loop base backoff in seconds.
    pub reconnect_base_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            setup_attempts: 7,
            setup_base_secs: 15,
            reconnect_attempts: 7,
            reconnect_base_secs: 10,
        }
    }
}

/// `[logfile]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogfileSection {
    /// Log file path.
    pub path: String,
    /// Rotate before exceeding this size.
    #[serde(default = "default_log_bytes")]
    pub max_bytes: u64,
    /// Rotated files kept on disk.
    #[serde(default = "default_log_backups")]
    pub max_backups: usize,
}

/// `[update]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSection {
    /// Base URL prefixed to update filenames.
    #[serde(default)]
    pub base_url: String,
    /// Directory updates are written into.
    #[serde(default = "default_update_dir")]
    pub target_dir: String,
}

impl Default for UpdateSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            target_dir: default_update_dir(),
        }
    }
}

fn default_tick_interval() -> u64 {
    60
}

fn default_broker_port() -> u16 {
    1883
}

fn default_fetch_interval() -> u32 {
    10
}

fn default_log_bytes() -> u64 {
    64 * 1024
}

fn default_log_backups() -> usize {
    3
}

fn default_update_dir() -> String {
    ".".to_string()
}

impl NodeConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_str(&text)
    }

    /// Parse and validate config text.
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.user.is_empty() {
            return Err(ConfigError::Invalid("node.user must not be empty".into()));
        }
        if self.node.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "node.tick_interval_secs must be positive".into(),
            ));
        }
        if self.weather.fetch_interval_ticks == 0 {
            return Err(ConfigError::Invalid(
                "weather.fetch_interval_ticks must be positive".into(),
            ));
        }
        if self.sensors.max_failures == 0 {
            return Err(ConfigError::Invalid(
                "sensors.max_failures must be positive".into(),
            ));
        }
        if self.retry.setup_attempts == 0 || self.retry.reconnect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry attempt budgets must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Supervisor configuration derived from this file.
    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            tick_interval: Duration::from_secs(self.node.tick_interval_secs),
            setup_retry: RetryPolicy::new(self.retry.setup_attempts, self.retry.setup_base_secs),
            reconnect_retry: RetryPolicy::new(
                self.retry.reconnect_attempts,
                self.retry.reconnect_base_secs,
            ),
            recovery_cooldown: Duration::from_secs(self.sensors.recovery_cooldown_secs),
            update_base_url: self.update.base_url.clone(),
            log_tail_lines: 20,
        }
    }

    /// Broker credentials derived from this file.
    pub fn mqtt_credentials(&self) -> MqttCredentials {
        MqttCredentials {
            host: self.broker.host.clone(),
            port: self.broker.port,
            username: self.broker.username.clone(),
            key: self.broker.key.clone(),
            client_id: self.node.client_id.clone(),
        }
    }

    /// Wi-Fi candidates derived from this file.
    pub fn candidates(&self) -> Vec<NetworkCandidate> {
        self.network
            .candidates
            .iter()
            .map(|c| NetworkCandidate {
                ssid: c.ssid.clone(),
                psk: c.psk.clone(),
                priority: c.priority,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [node]
        user = "station"
        client_id = "aeris-balcony"
        tick_interval_secs = 30

        [[network.candidates]]
        ssid = "home"
        psk = "secret"
        priority = 1

        [[network.candidates]]
        ssid = "hotspot"
        psk = "secret2"
        priority = 2

        [broker]
        host = "io.example.net"
        username = "station"
        key = "aio_key"

        [weather]
        api_key = "owm_key"
        latitude = 52.52
        longitude = 13.40

        [sensors]
        max_failures = 3
        recovery_cooldown_secs = 600

        [logfile]
        path = "/var/log/aeris.log"

        [update]
        base_url = "http://firmware.example.net/aeris"
    "#;

    #[test]
    fn full_config_parses() {
        let config = NodeConfig::from_str(FULL).unwrap();
        assert_eq!(config.node.user, "station");
        assert_eq!(config.node.tick_interval_secs, 30);
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.weather.fetch_interval_ticks, 10);
        assert_eq!(config.sensors.max_failures, 3);
        assert_eq!(config.candidates().len(), 2);
        assert_eq!(config.logfile.as_ref().unwrap().max_backups, 3);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = NodeConfig::from_str(
            r#"
            [node]
            user = "station"
            client_id = "aeris"

            [broker]
            host = "io.example.net"
            username = "station"
            key = "k"

            [weather]
            api_key = "k"
            latitude = 0.0
            longitude = 0.0
        "#,
        )
        .unwrap();
        assert_eq!(config.node.tick_interval_secs, 60);
        assert_eq!(config.sensors.max_failures, 5);
        assert_eq!(config.retry.setup_attempts, 7);
        assert!(config.logfile.is_none());
        assert!(config.candidates().is_empty());
    }

    #[test]
    fn supervisor_config_is_derived() {
        let config = NodeConfig::from_str(FULL).unwrap();
        let sup = config.supervisor();
        assert_eq!(sup.tick_interval, Duration::from_secs(30));
        assert_eq!(sup.recovery_cooldown, Duration::from_secs(600));
        assert_eq!(sup.setup_retry.max_attempts, 7);
        assert_eq!(sup.update_base_url, "http://firmware.example.net/aeris");
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let err = NodeConfig::from_str(
            r#"
            [node]
            user = "station"
            client_id = "aeris"
            tick_interval_secs = 0

            [broker]
            host = "h"
            username = "u"
            key = "k"

            [weather]
            api_key = "k"
            latitude = 0.0
            longitude = 0.0
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = NodeConfig::from_str(
            r#"
            [node]
            user = "station"
            client_id = "aeris"
            typo_key = true

            [broker]
            host = "h"
            username = "u"
            key = "k"

            [weather]
            api_key = "k"
            latitude = 0.0
            longitude = 0.0
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
