use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::environment::{EnvironmentProvider, OpenMeteoClient, SyntheticEnvironment};
use crate::simulation::{EngineConfig, MotionConfig};
use crate::sinks::{AlertChannel, LogSink, ReadingSink, WebhookSink};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "REEFER__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("{0}")]
    Build(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_motion"))]
pub struct Config {
    #[validate(nested)]
    pub simulation: SimulationConfig,
    pub motion: MotionConfig,
    #[validate(nested)]
    pub environment: EnvironmentConfig,
    #[validate(nested)]
    pub sinks: SinksConfig,
    #[validate(nested)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    #[validate(range(min = 1))]
    pub tick_seconds: u64,
    /// Pace ticks on the wall clock; otherwise run as fast as possible
    pub realtime: bool,
    pub seed: u64,
    #[validate(range(min = 1))]
    pub fleet_size: usize,
    pub max_ticks: Option<u64>,
    #[validate(range(min = 1))]
    pub max_concurrency: usize,
    pub optimization_every_ticks: u64,
    #[validate(range(min = 1))]
    pub history_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 30,
            realtime: true,
            seed: 42,
            fleet_size: 10,
            max_ticks: None,
            max_concurrency: 32,
            optimization_every_ticks: 20,
            history_capacity: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnvironmentProviderKind {
    Synthetic,
    OpenMeteo,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub provider: EnvironmentProviderKind,
    #[validate(url)]
    pub base_url: String,
    #[validate(range(min = 1))]
    pub http_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub max_retries: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            provider: EnvironmentProviderKind::Synthetic,
            base_url: crate::environment::open_meteo::DEFAULT_BASE_URL.to_string(),
            http_timeout_seconds: 10,
            cache_ttl_seconds: 600,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SinkKind {
    Log,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_sink"))]
pub struct SinkConfig {
    pub kind: SinkKind,
    #[validate(url)]
    pub url: Option<String>,
    #[validate(range(min = 1))]
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Log,
            url: None,
            timeout_seconds: 5,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SinksConfig {
    #[validate(nested)]
    pub readings: SinkConfig,
    #[validate(nested)]
    pub alerts: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Build(format!("server address: {e}")))
    }
}

fn validate_motion(config: &Config) -> Result<(), ValidationError> {
    let m = &config.motion;
    let values = [m.min_speed_kmh, m.max_speed_kmh, m.scale_deg_per_kmh];
    if !values.iter().all(|v| v.is_finite()) {
        return Err(ValidationError::new("motion_not_finite"));
    }
    if m.min_speed_kmh < 0.0 || m.min_speed_kmh > m.max_speed_kmh {
        return Err(ValidationError::new("motion_speed_range"));
    }
    Ok(())
}

fn validate_sink(sink: &SinkConfig) -> Result<(), ValidationError> {
    if sink.kind == SinkKind::Webhook && sink.url.as_deref().map_or(true, str::is_empty) {
        return Err(ValidationError::new("webhook_requires_url"));
    }
    Ok(())
}

impl Config {
    /// `config/default.toml` (optional) layered under `REEFER__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(DEFAULT_CONFIG_PATH))
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let sim = &self.simulation;
        EngineConfig {
            tick_interval: Duration::from_secs(sim.tick_seconds),
            realtime: sim.realtime,
            seed: sim.seed,
            max_ticks: sim.max_ticks,
            max_concurrency: sim.max_concurrency,
            optimization_every_ticks: sim.optimization_every_ticks,
            history_capacity: sim.history_capacity,
            environment_cache_ttl: Duration::from_secs(self.environment.cache_ttl_seconds),
            ..EngineConfig::default()
        }
    }

    pub fn environment_provider(&self) -> Result<Arc<dyn EnvironmentProvider>, ConfigError> {
        let env = &self.environment;
        let provider: Arc<dyn EnvironmentProvider> = match env.provider {
            EnvironmentProviderKind::Synthetic => {
                Arc::new(SyntheticEnvironment::new(self.simulation.seed))
            }
            EnvironmentProviderKind::OpenMeteo => Arc::new(
                OpenMeteoClient::new(
                    env.base_url.clone(),
                    Duration::from_secs(env.http_timeout_seconds),
                    env.max_retries,
                )
                .map_err(|e| ConfigError::Build(e.to_string()))?,
            ),
        };
        Ok(provider)
    }

    pub fn reading_sink(&self) -> Result<Arc<dyn ReadingSink>, ConfigError> {
        let sink: Arc<dyn ReadingSink> = match webhook(&self.sinks.readings)? {
            Some(sink) => Arc::new(sink),
            None => Arc::new(LogSink),
        };
        Ok(sink)
    }

    pub fn alert_channel(&self) -> Result<Arc<dyn AlertChannel>, ConfigError> {
        let channel: Arc<dyn AlertChannel> = match webhook(&self.sinks.alerts)? {
            Some(sink) => Arc::new(sink),
            None => Arc::new(LogSink),
        };
        Ok(channel)
    }
}

fn webhook(sink: &SinkConfig) -> Result<Option<WebhookSink>, ConfigError> {
    match (sink.kind, sink.url.as_deref()) {
        (SinkKind::Log, _) => Ok(None),
        (SinkKind::Webhook, Some(url)) => WebhookSink::new(
            url,
            Duration::from_secs(sink.timeout_seconds),
            sink.max_retries,
        )
        .map(Some)
        .map_err(|e| ConfigError::Build(e.to_string())),
        (SinkKind::Webhook, None) => Err(ConfigError::Build("webhook sink has no url".into())),
    }
}
