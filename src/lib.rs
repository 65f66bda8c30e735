//! # evonet
//!
//! Graph-wired heterogeneous neural networks for evolutionary-robotics
//! controllers.
//!
//! ## Features
//!
//! - **Heterogeneous**: static, time-delayed, recurrent, CTRNN and RBF layers
//! - **Cyclic graphs**: delayed feedback loops carry state across ticks
//! - **Evolvable**: flat per-layer parameter vectors for an outer search
//! - **Configurable**: YAML network definitions
//! - **Reproducible**: seeded initialisation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evonet::{LayerKind, LayerSpec, Network, SensorInputs};
//!
//! let specs = vec![
//!     LayerSpec::new("eyes", 2, LayerKind::Static).outputs(["brain"]),
//!     LayerSpec::new("brain", 4, LayerKind::Ctrnn)
//!         .outputs(["brain", "wheel"])
//!         .delayed(["brain"]),
//! ];
//! let mut network = Network::new_with_seed(specs, 0.1, 42).unwrap();
//!
//! let mut inputs = SensorInputs::new();
//! inputs.insert("eyes".to_string(), vec![0.2, 0.8]);
//! let outputs = network.step(&inputs).unwrap();
//! println!("wheel: {:?}", outputs["wheel"]);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use evonet::Config;
//!
//! let mut config = Config::default();
//! config.network.time_interval = 0.05;
//! config.network.seed = Some(7);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Checkpoints
//!
//! ```rust,no_run
//! use evonet::{Config, Network};
//!
//! let config = Config::default();
//! let network = Network::from_config(&config.network).unwrap();
//! network.save_parameters_to_file("controller.bin").unwrap();
//!
//! let mut restored = network.fork();
//! restored.load_parameters_from_file("controller.bin").unwrap();
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod network;
pub mod neural;
pub mod sensor;
pub mod stats;

// Re-export main types
pub use config::Config;
pub use error::{ConfigError, NetworkError, OverlongParameterWarning, PersistenceError};
pub use network::{ExecutionMode, LayerSpec, Network, SensorInputs, TerminalOutputs};
pub use neural::{Activation, ActivationKind, Layer, LayerKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Time `ticks` steps of the default controller network
pub fn benchmark(ticks: u64, mode: ExecutionMode) -> Result<BenchmarkResult, NetworkError> {
    use std::time::Instant;

    let mut config = Config::default();
    config.network.seed = Some(0);
    config.network.execution = mode;
    let mut network = Network::from_config(&config.network)?;

    let inputs: SensorInputs = network
        .topology()
        .specs()
        .iter()
        .filter(|spec| network.input_layers().contains(&spec.name.as_str()))
        .map(|spec| (spec.name.clone(), vec![0.5; spec.size]))
        .collect();

    let start = Instant::now();
    for _ in 0..ticks {
        network.step(&inputs)?;
    }
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        ticks,
        mode,
        layers: network.number_of_layers(),
        parameters: network.parameter_count(),
        elapsed_secs: elapsed.as_secs_f64(),
        ticks_per_second: ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub ticks: u64,
    pub mode: ExecutionMode,
    pub layers: usize,
    pub parameters: usize,
    pub elapsed_secs: f64,
    pub ticks_per_second: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Mode: {:?}", self.mode)?;
        writeln!(f, "Layers: {} ({} parameters)", self.layers, self.parameters)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} ticks/s", self.ticks_per_second)?;
        Ok(())
    }
}
