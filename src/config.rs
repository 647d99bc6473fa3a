//! Console configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `inserv-manager.toml` in the working directory, or the file given with `--config`
//! 3. Environment variables prefixed with `INSERV_` (nested keys split on `__`)
//!
//! # Example
//! ```toml
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [controls]
//! float_min_step = 0.001
//! float_decimals = 3
//!
//! [actions]
//! reserved = ["initialize", "finalize", "update", "refresh"]
//! async_marker = "_async"
//!
//! [bench]
//! path = "benches/optics.toml"
//! ```
//!
//! `INSERV_LOGGING__LEVEL=trace` overrides `logging.level`.

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use inserv_binding::{AssemblyOptions, ControlOptions};
use inserv_core::ActionPolicy;
use inserv_mock::BenchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "inserv-manager.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "INSERV_";

/// Top-level console configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log output
    pub logging: LoggingConfig,
    /// Stepper precision
    pub controls: ControlsConfig,
    /// Action exposure policy
    pub actions: ActionsConfig,
    /// Simulated namespace
    pub bench: BenchSettings,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored (development)
    Pretty,
    /// One line per event
    Compact,
    /// Structured JSON (log aggregation)
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level (trace, debug, info, warn, error); `RUST_LOG` wins
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Stepper precision settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Smallest increment of floating-point steppers
    pub float_min_step: f64,
    /// Decimals shown by floating-point steppers
    pub float_decimals: u32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        let defaults = ControlOptions::default();
        Self {
            float_min_step: defaults.float_min_step,
            float_decimals: defaults.float_decimals,
        }
    }
}

/// Which discovered actions become triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Lifecycle hooks never offered as triggers
    pub reserved: Vec<String>,
    /// Name fragment marking asynchronous variants
    pub async_marker: String,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        let policy = ActionPolicy::default();
        Self {
            reserved: policy.reserved,
            async_marker: policy.async_marker,
        }
    }
}

/// Simulated namespace settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    /// Bench file; the built-in demo bench when unset
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load defaults, then the config file, then environment overrides.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        debug!("Loading configuration from: {}", file.display());

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", file.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            bail!(
                "Invalid logging.level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            );
        }
        if self.controls.float_min_step.is_nan() || self.controls.float_min_step <= 0.0 {
            bail!(
                "Invalid controls.float_min_step {}. Must be positive",
                self.controls.float_min_step
            );
        }
        if self.controls.float_decimals > 15 {
            bail!(
                "Invalid controls.float_decimals {}. Must be 0-15",
                self.controls.float_decimals
            );
        }
        Ok(())
    }

    /// Options handed to tree assembly.
    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            controls: ControlOptions {
                float_min_step: self.controls.float_min_step,
                float_decimals: self.controls.float_decimals,
            },
            actions: ActionPolicy {
                reserved: self.actions.reserved.clone(),
                async_marker: self.actions.async_marker.clone(),
            },
        }
    }

    /// The configured bench, or the demo bench.
    pub fn load_bench(&self) -> Result<BenchConfig> {
        match &self.bench.path {
            Some(path) => BenchConfig::load(path),
            None => BenchConfig::demo(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.assembly_options(), AssemblyOptions::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.controls.float_min_step = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.controls.float_decimals = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_demo_bench_when_unset() {
        let bench = AppConfig::default().load_bench().unwrap();
        assert_eq!(bench.servers.len(), 2);
    }
}
