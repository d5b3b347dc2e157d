//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use glacier_temp_hw::report::{find_model, PumpModel};

use crate::sampler::{default_rules, MatchRule};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler period in milliseconds. Unset means 1000, or 5000 in
    /// display-only mode.
    #[serde(default)]
    pub tick_ms: Option<u64>,

    /// Skip the pump stage entirely; only the tray icon is updated.
    #[serde(default)]
    pub display_only: bool,

    /// Pump configuration.
    #[serde(default)]
    pub pump: PumpConfig,

    /// Sensor selection.
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Pre-loop checks.
    #[serde(default)]
    pub startup: StartupConfig,
}

/// Pump device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Model names, resolved against the hardware crate's table. Every
    /// listed model gets its own independent session.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

/// Sensor selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SensorConfig {
    /// Ordered match rules; first hit wins. Empty uses the built-in order.
    #[serde(default)]
    pub rules: Vec<MatchRule>,
}

/// Startup check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Skip the root check (for installs with hidraw udev rules).
    #[serde(default)]
    pub allow_unprivileged: bool,

    /// Single-instance lock file.
    #[serde(default = "default_pidfile")]
    pub pidfile: PathBuf,
}

fn default_models() -> Vec<String> {
    vec!["HWT700PT".to_string()]
}

fn default_pidfile() -> PathBuf {
    PathBuf::from("/run/glacier-temp.pid")
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_display_only_tick_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms: None,
            display_only: false,
            pump: PumpConfig::default(),
            sensor: SensorConfig::default(),
            startup: StartupConfig::default(),
        }
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            allow_unprivileged: false,
            pidfile: default_pidfile(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// The scheduler period, honoring the display-only default.
    pub fn effective_tick_ms(&self) -> u64 {
        self.tick_ms.unwrap_or(if self.display_only {
            default_display_only_tick_ms()
        } else {
            default_tick_ms()
        })
    }
}

impl PumpConfig {
    /// Resolves the configured names against the model table.
    pub fn resolve_models(&self) -> Result<Vec<&'static PumpModel>> {
        self.models
            .iter()
            .map(|name| {
                find_model(name).with_context(|| format!("unknown pump model {name:?}"))
            })
            .collect()
    }
}

impl SensorConfig {
    /// Configured rules, or the built-in order when none are set.
    pub fn effective_rules(&self) -> Vec<MatchRule> {
        if self.rules.is_empty() {
            default_rules()
        } else {
            self.rules.clone()
        }
    }
}
