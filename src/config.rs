//! Configuration for building and running a controller network.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::error::ConfigError;
use crate::network::{ExecutionMode, LayerSpec, Topology};
use crate::neural::{Activation, LayerKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network definition and integration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Euler step Δt shared by every CTRNN layer
    pub time_interval: f64,
    /// Initialisation seed; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub execution: ExecutionMode,
    /// Layers in declaration order
    pub layers: Vec<LayerSpec>,
}

/// Logging and trace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter (off, error, warn, info, debug, trace); `RUST_LOG`
    /// overrides it
    pub log_level: String,
    /// Ticks between recorded trace entries
    pub trace_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    /// Two-wheeled robot: eight infrared beams, a self-coupled CTRNN and
    /// one tanh motor neuron per wheel
    fn default() -> Self {
        Self {
            time_interval: 0.01,
            seed: None,
            execution: ExecutionMode::Sequential,
            layers: vec![
                LayerSpec::new("sensors", 8, LayerKind::Static)
                    .sensor("infrared")
                    .outputs(["hidden"]),
                LayerSpec::new("hidden", 6, LayerKind::Ctrnn)
                    .activation(Activation::sigmoid())
                    .outputs(["hidden", "motor_left", "motor_right"])
                    .delayed(["hidden"]),
                LayerSpec::new("motor_left", 1, LayerKind::Static)
                    .activation(Activation::tanh())
                    .outputs(["left_wheel"]),
                LayerSpec::new("motor_right", 1, LayerKind::Static)
                    .activation(Activation::tanh())
                    .outputs(["right_wheel"]),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            trace_interval: 1,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values, including the network wiring
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dt = self.network.time_interval;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ConfigError::Invalid("time_interval must be > 0".to_string()));
        }
        if self.logging.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level {}",
                self.logging.log_level
            )));
        }
        if self.logging.trace_interval == 0 {
            return Err(ConfigError::Invalid("trace_interval must be > 0".to_string()));
        }
        Topology::build(self.network.layers.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
