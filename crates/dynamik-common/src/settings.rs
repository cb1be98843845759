//! Configuration loading for dynamik.
//! Reads dynamik.toml from the current directory or the path in DYNAMIK_CONFIG,
//! then applies environment overrides. Every value has a local-development default.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::{DynamikError, Result};

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub pacing: PacingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_bind() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 3000)) }
fn default_static_dir() -> PathBuf { PathBuf::from("crates/dynamik-web/static") }

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind(), static_dir: default_static_dir() }
    }
}

/// Which broker implementation backs the queue and the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    #[default]
    Amqp,
    /// In-process broker, for running without RabbitMQ.
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct BrokerSettings {
    #[serde(default)]
    pub backend: BrokerBackend,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password", deserialize_with = "secret_from_string")]
    pub password: SecretString,
    #[serde(default = "default_experiments_queue")]
    pub experiments_queue: String,
    #[serde(default = "default_status_exchange")]
    pub status_exchange: String,
}

fn default_host()              -> String { "localhost".to_string() }
fn default_port()              -> u16    { 5672 }
fn default_user()              -> String { "guest".to_string() }
fn default_password()          -> SecretString { SecretString::from("guest".to_string()) }
fn default_experiments_queue() -> String { "experiments@dynamik".to_string() }
fn default_status_exchange()   -> String { "status@dynamik".to_string() }

fn secret_from_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::default(),
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            experiments_queue: default_experiments_queue(),
            status_exchange: default_status_exchange(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
}

fn default_base_path() -> PathBuf { PathBuf::from("../dynamik-data") }

impl Default for StorageSettings {
    fn default() -> Self {
        Self { base_path: default_base_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_max_bytes() -> u64   { 50 * 1024 * 1024 }
fn default_max_files() -> usize { 1 }

impl Default for UploadSettings {
    fn default() -> Self {
        Self { max_bytes: default_max_bytes(), max_files: default_max_files() }
    }
}

/// Artificial delays that pace the UI. They have no effect on processing.
#[derive(Debug, Clone, Deserialize)]
pub struct PacingSettings {
    #[serde(default = "default_upload_delay_ms")]
    pub upload_delay_ms: u64,
    #[serde(default = "default_submit_delay_ms")]
    pub submit_delay_ms: u64,
}

fn default_upload_delay_ms() -> u64 { 1_000 }
fn default_submit_delay_ms() -> u64 { 3_000 }

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            upload_delay_ms: default_upload_delay_ms(),
            submit_delay_ms: default_submit_delay_ms(),
        }
    }
}

impl PacingSettings {
    /// No pacing at all, for tests.
    pub fn none() -> Self {
        Self { upload_delay_ms: 0, submit_delay_ms: 0 }
    }

    pub fn upload_delay(&self) -> Duration { Duration::from_millis(self.upload_delay_ms) }
    pub fn submit_delay(&self) -> Duration { Duration::from_millis(self.submit_delay_ms) }
}

impl Settings {
    /// Load settings from the optional TOML file and the process environment.
    /// A `.env` file in the working directory is honoured.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("DYNAMIK_CONFIG").unwrap_or_else(|_| "dynamik.toml".to_string());
        let mut settings = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml_str(&content)?
        } else {
            tracing::debug!(path = %path, "No config file, using defaults");
            Self::default()
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DynamikError::Config(e.to_string()))
    }

    /// Apply environment-style overrides. `lookup` maps a variable name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("RABBITMQ_HOST") {
            self.broker.host = host;
        }
        if let Some(port) = lookup("RABBITMQ_PORT") {
            self.broker.port = port
                .parse()
                .map_err(|_| DynamikError::Config(format!("RABBITMQ_PORT is not a port: {port}")))?;
        }
        if let Some(user) = lookup("RABBITMQ_USER") {
            self.broker.user = user;
        }
        if let Some(pass) = lookup("RABBITMQ_PASS") {
            self.broker.password = SecretString::from(pass);
        }
        if let Some(queue) = lookup("EXPERIMENTS_QUEUE") {
            self.broker.experiments_queue = queue;
        }
        if let Some(exchange) = lookup("LIVE_STATUS_EXCHANGE") {
            self.broker.status_exchange = exchange;
        }
        if let Some(backend) = lookup("DYNAMIK_BROKER") {
            self.broker.backend = match backend.to_ascii_lowercase().as_str() {
                "amqp" => BrokerBackend::Amqp,
                "memory" => BrokerBackend::Memory,
                other => return Err(DynamikError::Config(format!("unknown broker backend: {other}"))),
            };
        }
        if let Some(base) = lookup("BASE_DATA_PATH") {
            self.storage.base_path = PathBuf::from(base);
        }
        if let Some(bind) = lookup("DYNAMIK_BIND") {
            self.server.bind = bind
                .parse()
                .map_err(|_| DynamikError::Config(format!("DYNAMIK_BIND is not an address: {bind}")))?;
        }
        Ok(())
    }
}
