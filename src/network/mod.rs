//! Graph-wired networks: construction from layer specs, per-tick
//! execution and the flat parameter interface.
//!
//! A [`Network`] pairs an immutable [`Topology`] (shared through `Arc`)
//! with the layers it instantiates and the previous tick's outputs.

mod executor;
mod parameters;
pub mod spec;
pub mod topology;

pub use spec::{LayerSpec, RbfSpec};
pub use topology::{Connection, ReadMode, StaleConnection, Topology};

use crate::config::NetworkConfig;
use crate::error::{NetworkError, Result};
use crate::neural::{CtrnnLayer, DynamicLayer, Layer, LayerKind, RbfLayer, StaticLayer};
use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-tick sensor vectors keyed by input layer name or sensor tag
pub type SensorInputs = HashMap<String, Vec<f64>>;

/// Summed outputs keyed by terminal sink name
pub type TerminalOutputs = HashMap<String, Vec<f64>>;

/// How layers sharing one level are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Layers of a level run on the rayon pool
    Parallel,
}

/// A built network with its own layers and tick state
#[derive(Debug, Clone)]
pub struct Network {
    topology: Arc<Topology>,
    layers: Vec<Layer>,
    /// Output of every layer for the tick just completed
    state: Vec<Array1<f64>>,
    time_interval: f64,
    mode: ExecutionMode,
    tick: u64,
}

impl Network {
    /// Build with a random seed
    pub fn new(specs: Vec<LayerSpec>, time_interval: f64) -> Result<Self> {
        Self::new_with_seed(specs, time_interval, rand::thread_rng().gen())
    }

    /// Build with reproducible `[0, 1)` initialisation
    pub fn new_with_seed(specs: Vec<LayerSpec>, time_interval: f64, seed: u64) -> Result<Self> {
        if !(time_interval.is_finite() && time_interval > 0.0) {
            return Err(NetworkError::configuration(format!(
                "time interval must be positive, got {}",
                time_interval
            )));
        }

        let topology = Topology::build(specs)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let layers = topology
            .specs()
            .iter()
            .enumerate()
            .map(|(i, spec)| instantiate(&topology, i, spec, time_interval, &mut rng))
            .collect::<Result<Vec<_>>>()?;
        let state = initial_state(&layers);

        log::debug!("network layers initialised with seed {}", seed);
        Ok(Self {
            topology: Arc::new(topology),
            layers,
            state,
            time_interval,
            mode: ExecutionMode::default(),
            tick: 0,
        })
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        let network = match config.seed {
            Some(seed) => Self::new_with_seed(config.layers.clone(), config.time_interval, seed)?,
            None => Self::new(config.layers.clone(), config.time_interval)?,
        };
        Ok(network.with_execution_mode(config.execution))
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    /// Sibling network sharing this topology, with cloned parameters and
    /// fresh state
    pub fn fork(&self) -> Self {
        let mut layers = self.layers.clone();
        layers.iter_mut().for_each(Layer::reset_state);
        let state = initial_state(&layers);
        Self {
            topology: Arc::clone(&self.topology),
            layers,
            state,
            time_interval: self.time_interval,
            mode: self.mode,
            tick: 0,
        }
    }

    /// Clear tick state and every layer's internal memory
    pub fn reset_state(&mut self) {
        self.layers.iter_mut().for_each(Layer::reset_state);
        self.state = initial_state(&self.layers);
        self.tick = 0;
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.topology.index_of(name).map(|i| &self.layers[i])
    }

    /// Mutable access for the shape-checked setters of one layer
    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.topology.index_of(name).map(move |i| &mut self.layers[i])
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Swap in a whole layer of identical shape, returning the old one
    pub fn replace_layer(&mut self, layer: Layer) -> Result<Layer> {
        let index = self.index_of(layer.name())?;
        layer.check_consistent()?;
        if !self.layers[index].same_shape(&layer) {
            return Err(NetworkError::configuration(format!(
                "replacement for {} has a different kind or shape",
                layer.name()
            )));
        }
        Ok(std::mem::replace(&mut self.layers[index], layer))
    }

    /// Outputs of the last completed tick, in declaration order
    pub(crate) fn tick_state(&self) -> &[Array1<f64>] {
        &self.state
    }

    /// Swap in layers together with the tick state they ran against;
    /// callers have checked names and shapes
    pub(crate) fn restore(&mut self, layers: Vec<Layer>, state: Vec<Array1<f64>>, tick: u64) {
        self.layers = layers;
        self.state = state;
        self.tick = tick;
    }

    pub fn last_output(&self, name: &str) -> Option<&Array1<f64>> {
        self.topology.index_of(name).map(|i| &self.state[i])
    }

    /// Every layer's output from the last completed tick
    pub fn last_outputs(&self) -> HashMap<String, Vec<f64>> {
        self.layers
            .iter()
            .zip(&self.state)
            .map(|(layer, output)| (layer.name().to_string(), output.to_vec()))
            .collect()
    }

    /// Completed ticks since construction or the last reset
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time_interval(&self) -> f64 {
        self.time_interval
    }

    pub fn number_of_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn order_of_execution(&self) -> Vec<&str> {
        self.topology.order_of_execution()
    }

    pub fn levels(&self) -> Vec<Vec<&str>> {
        self.topology.levels()
    }

    pub fn input_layers(&self) -> Vec<&str> {
        self.topology.input_layers()
    }

    pub fn terminal_layers(&self) -> Vec<&str> {
        self.topology.terminal_layers()
    }

    pub fn stale_connections(&self) -> &[StaleConnection] {
        self.topology.stale_connections()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.topology
            .index_of(name)
            .ok_or_else(|| NetworkError::configuration(format!("no layer named {}", name)))
    }
}

fn initial_state(layers: &[Layer]) -> Vec<Array1<f64>> {
    layers.iter().map(|l| Array1::zeros(l.output_dim())).collect()
}

fn instantiate(
    topology: &Topology,
    index: usize,
    spec: &LayerSpec,
    time_interval: f64,
    rng: &mut ChaCha8Rng,
) -> Result<Layer> {
    let input_dim = topology.input_dim_at(index);
    let name = spec.name.as_str();
    let activation = spec.activation;

    let layer = match spec.kind {
        LayerKind::Static => Layer::Static(StaticLayer::new(name, input_dim, spec.size, activation, rng)),
        LayerKind::Dynamic => {
            let recurrent_dims: Vec<usize> = topology
                .recurrent_sources(index)
                .iter()
                .map(|&source| topology.specs()[source].size)
                .collect();
            Layer::Dynamic(DynamicLayer::new(
                name,
                input_dim,
                spec.size,
                spec.delay,
                &recurrent_dims,
                activation,
                rng,
            ))
        }
        LayerKind::Ctrnn => {
            let time_constants = match &spec.time_constants {
                Some(tau) => Array1::from_vec(tau.clone()),
                None => Array1::ones(spec.size),
            };
            Layer::Ctrnn(CtrnnLayer::new(
                name,
                input_dim,
                spec.size,
                time_interval,
                time_constants,
                activation,
                rng,
            )?)
        }
        LayerKind::Rbf => Layer::Rbf(RbfLayer::new(
            name,
            input_dim,
            spec.size,
            spec.rbf.distance,
            spec.rbf.basis,
            spec.rbf.parameter,
            rng,
        )?),
    };
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::Activation;

    fn specs() -> Vec<LayerSpec> {
        vec![
            LayerSpec::new("in", 2, LayerKind::Static).outputs(["ctrnn", "dyn"]),
            LayerSpec::new("ctrnn", 3, LayerKind::Ctrnn)
                .activation(Activation::sigmoid())
                .time_constants(vec![1.0, 2.0, 4.0])
                .outputs(["rbf"]),
            LayerSpec::new("dyn", 2, LayerKind::Dynamic)
                .delay(3)
                .recurrent(["ctrnn"])
                .outputs(["rbf"]),
            LayerSpec::new("rbf", 4, LayerKind::Rbf).outputs(["motor"]),
        ]
    }

    #[test]
    fn test_instantiates_every_kind() {
        let network = Network::new_with_seed(specs(), 0.1, 3).unwrap();
        assert_eq!(network.number_of_layers(), 4);
        assert_eq!(network.layer("ctrnn").unwrap().kind(), LayerKind::Ctrnn);
        assert_eq!(network.layer("ctrnn").unwrap().input_dim(), 2);
        assert_eq!(network.layer("rbf").unwrap().input_dim(), 5);

        match network.layer("dyn").unwrap() {
            Layer::Dynamic(layer) => {
                assert_eq!(layer.delay_dim(), 3);
                assert_eq!(layer.recurrent_count(), 1);
            }
            other => panic!("expected dynamic layer, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let a = Network::new_with_seed(specs(), 0.1, 42).unwrap();
        let b = Network::new_with_seed(specs(), 0.1, 42).unwrap();
        let c = Network::new_with_seed(specs(), 0.1, 43).unwrap();
        assert_eq!(a.return_parameters_as_vector(), b.return_parameters_as_vector());
        assert_ne!(a.return_parameters_as_vector(), c.return_parameters_as_vector());
    }

    #[test]
    fn test_time_constant_length_is_dimension_error() {
        let bad = vec![
            LayerSpec::new("in", 1, LayerKind::Static).outputs(["c"]),
            LayerSpec::new("c", 2, LayerKind::Ctrnn).time_constants(vec![1.0]),
        ];
        let err = Network::new_with_seed(bad, 0.1, 1).unwrap_err();
        assert!(matches!(err, NetworkError::Dimension { .. }));
    }

    #[test]
    fn test_rejects_non_positive_time_interval() {
        assert!(Network::new_with_seed(specs(), 0.0, 1).is_err());
        assert!(Network::new_with_seed(specs(), f64::NAN, 1).is_err());
    }

    #[test]
    fn test_fork_shares_topology() {
        let network = Network::new_with_seed(specs(), 0.1, 5).unwrap();
        let fork = network.fork();
        assert!(Arc::ptr_eq(network.topology(), fork.topology()));
        assert_eq!(network.return_parameters_as_vector(), fork.return_parameters_as_vector());
    }

    #[test]
    fn test_replace_layer_checks_shape() {
        let mut network = Network::new_with_seed(specs(), 0.1, 5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let same = Layer::Static(StaticLayer::new("in", 2, 2, Activation::tanh(), &mut rng));
        assert!(network.replace_layer(same).is_ok());

        let wider = Layer::Static(StaticLayer::new("in", 2, 3, Activation::tanh(), &mut rng));
        assert!(network.replace_layer(wider).is_err());

        let unknown = Layer::Static(StaticLayer::new("ghost", 2, 2, Activation::tanh(), &mut rng));
        assert!(network.replace_layer(unknown).is_err());
    }
}
