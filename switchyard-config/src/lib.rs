//! # Switchyard Configuration System
//!
//! Static configuration consumed by a listener at construction time: pool sizes,
//! overflow policies, expiry, retry ceilings, loop pacing and telemetry.
//!
//! ## Features
//! - **Layered loading**: compiled defaults, YAML files, then environment variables
//! - **Validation**: every section is checked after extraction
//! - **Rendering**: the effective configuration can be printed back as YAML

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

mod error;
mod listener;
mod pools;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use listener::ListenerConfig;
pub use pools::{IncomingPoolConfig, PoolsConfig, ProcessingPoolConfig, SendingPoolConfig};
pub use telemetry::TelemetryConfig;

const ENV_PREFIX: &str = "SWITCHYARD_";
const BASE_FILE: &str = "config/switchyard.yaml";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct SwitchyardConfig {
    /// Inbox, in-flight and outbox pool parameters.
    #[validate(nested)]
    #[serde(default)]
    pub pools: PoolsConfig,

    /// Listener identity and dispatcher loop pacing.
    #[validate(nested)]
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SwitchyardConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/switchyard.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<environment>.yaml` - Environment-specific overrides
    ///    (`SWITCHYARD_ENV`, default `production`).
    /// 4. `SWITCHYARD_*` environment variables, nested with `__`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(SwitchyardConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            info!("{BASE_FILE} not found, using default configuration");
        }

        let env = std::env::var("SWITCHYARD_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file, layered over defaults and under the environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(SwitchyardConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}
