//! Simulator configuration.
//!
//! Layered, later sources winning: built-in defaults, an optional config
//! file (format from its extension), `DRIP_*` environment variables, then
//! command-line flags (applied by the caller).

use std::path::Path;

use anyhow::{Context, Result};
use drip_hub::HubConfig;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SimConfig {
    pub hub: HubConfig,
    /// Log filter, e.g. "info" or "drip_streams=debug".
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hub: HubConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl SimConfig {
    /// Load defaults, then `file` if given, then the environment.
    ///
    /// Environment keys use `__` between nesting levels:
    /// `DRIP_LOG_LEVEL`, `DRIP_HUB__CYCLE_SECS`.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&SimConfig::default())
            .context("encoding default config")?;
        let mut builder = ::config::Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("DRIP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let cfg: SimConfig = builder
            .build()
            .context("reading configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        cfg.hub.validate()?;
        Ok(cfg)
    }
}
