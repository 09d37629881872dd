// config/mod.rs
use config::{Config, ConfigBuilder, builder::DefaultState};
use serde::Deserialize;
use validator::Validate;

use crate::bridge::InitPolicy;

#[derive(Debug, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub server: ServerSettings,
    #[validate(nested)]
    pub metrics: MetricsSettings,
    pub bridge: BridgeSettings,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServerSettings {
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,
    /// Sessions with no calls for this long are dropped.
    #[validate(range(min = 1))]
    pub session_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MetricsSettings {
    pub enabled: bool,
    #[validate(range(min = 1))]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Mock,
    Vendor,
}

#[derive(Debug, Deserialize)]
pub struct BridgeSettings {
    pub backend: BackendKind,
    pub init_policy: InitPolicy,
    pub mock_latency_ms: u64,
    pub mock_fixtures: bool,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("server.address", "0.0.0.0:3000")?
        .set_default("server.max_connections", 100)?
        .set_default("server.session_ttl_secs", 900)?
        .set_default("metrics.enabled", false)?
        .set_default("metrics.port", 9000)?
        .set_default("bridge.backend", "mock")?
        .set_default("bridge.init_policy", "discovery_only")?
        .set_default("bridge.mock_latency_ms", 0)?
        .set_default("bridge.mock_fixtures", false)
}

impl Settings {
    pub fn new() -> anyhow::Result<Self> {
        let builder = defaults()?
            .add_source(config::File::with_name("config/config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));
        Self::finish(builder)
    }

    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let builder =
            defaults()?.add_source(config::File::from_str(source, config::FileFormat::Toml));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
