use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::ax25::{Address, Ax25Error};
use crate::tnc::{
    ConcernedSet, SessionSettings, StationIdentity, DEFAULT_READ_TIMEOUT,
    DEFAULT_REDIAL_INTERVAL,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid callsign in {field}: {source}")]
    Callsign { field: String, source: Ax25Error },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub station: StationConfig,
    pub tnc: TncConfig,
    pub tracking: TrackingConfig,
    pub web: Option<WebConfig>,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub callsign: String,
    #[serde(default = "default_symbol_table")]
    pub symbol_table: char,
    #[serde(default = "default_symbol_code")]
    pub symbol_code: char,
}

fn default_symbol_table() -> char {
    '/'
}

// balloon
fn default_symbol_code() -> char {
    'O'
}

#[derive(Debug, Clone, Deserialize)]
pub struct TncConfig {
    /// host:port of the KISS-over-TCP TNC.
    pub address: String,
    #[serde(
        default = "default_redial_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub redial_interval: Duration,
    #[serde(
        default = "default_read_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub read_timeout: Duration,
}

fn default_redial_interval() -> Duration {
    DEFAULT_REDIAL_INTERVAL
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

/// Accepts human readable durations such as `5s` or `3m`.
fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    pub balloon: String,
    pub vehicle: String,
    #[serde(default)]
    pub chasers: Vec<String>,
    /// Addressee of outgoing messages; defaults to `vehicle`.
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SendBeacon,
    SendMessage,
}

impl Permission {
    /// The outbound queue this permission opens.
    pub fn queue(self) -> &'static str {
        match self {
            Permission::SendBeacon => "position",
            Permission::SendMessage => "message",
        }
    }
}

fn callsign(field: &str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|source| ConfigError::Callsign {
        field: field.to_string(),
        source,
    })
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }

    /// Validates every callsign and builds the session settings.
    pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
        let tracking = &self.tracking;
        let balloon = callsign("tracking.balloon", &tracking.balloon)?;
        let vehicle = callsign("tracking.vehicle", &tracking.vehicle)?;
        let chasers = tracking
            .chasers
            .iter()
            .enumerate()
            .map(|(i, c)| callsign(&format!("tracking.chasers[{}]", i), c))
            .collect::<Result<Vec<_>, _>>()?;
        let recipient = match &tracking.recipient {
            Some(r) => callsign("tracking.recipient", r)?,
            None => vehicle.clone(),
        };

        Ok(SessionSettings {
            address: self.tnc.address.clone(),
            redial_interval: self.tnc.redial_interval,
            read_timeout: self.tnc.read_timeout,
            station: StationIdentity {
                address: callsign("station.callsign", &self.station.callsign)?,
                symbol_table: self.station.symbol_table,
                symbol_code: self.station.symbol_code,
            },
            concerned: ConcernedSet::new(balloon, vehicle, chasers),
            recipient,
        })
    }
}
