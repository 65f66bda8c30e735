//! Declarative layer definitions consumed by the graph builder.

use crate::neural::{Activation, Basis, Distance, LayerKind};
use serde::{Deserialize, Serialize};

/// Distance/basis selection for RBF layers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RbfSpec {
    #[serde(default)]
    pub distance: Distance,
    #[serde(default)]
    pub basis: Basis,
    #[serde(default = "default_basis_parameter")]
    pub parameter: f64,
}

fn default_basis_parameter() -> f64 {
    1.0
}

impl Default for RbfSpec {
    fn default() -> Self {
        Self {
            distance: Distance::default(),
            basis: Basis::default(),
            parameter: default_basis_parameter(),
        }
    }
}

fn default_delay() -> usize {
    1
}

/// One layer of a network definition.
///
/// `outputs` names downstream layers or terminal sinks; `delayed` is the
/// subset of `outputs` whose consumer reads this layer's previous-tick
/// output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub size: usize,
    pub kind: LayerKind,
    #[serde(default)]
    pub activation: Activation,
    /// Sensor tag feeding this layer when it is an input layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delayed: Vec<String>,
    /// Time delay window (DYNAMIC)
    #[serde(default = "default_delay")]
    pub delay: usize,
    /// Per-neuron τ (CTRNN), all ones when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_constants: Option<Vec<f64>>,
    /// Layers replayed through recurrent taps (DYNAMIC)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrent: Vec<String>,
    /// Distance and basis (RBF)
    #[serde(default)]
    pub rbf: RbfSpec,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, size: usize, kind: LayerKind) -> Self {
        Self {
            name: name.into(),
            size,
            kind,
            activation: Activation::default(),
            sensor: None,
            outputs: Vec::new(),
            delayed: Vec::new(),
            delay: default_delay(),
            time_constants: None,
            recurrent: Vec::new(),
            rbf: RbfSpec::default(),
        }
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn sensor(mut self, tag: impl Into<String>) -> Self {
        self.sensor = Some(tag.into());
        self
    }

    pub fn outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn delayed<I, S>(mut self, delayed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delayed = delayed.into_iter().map(Into::into).collect();
        self
    }

    pub fn delay(mut self, delay: usize) -> Self {
        self.delay = delay;
        self
    }

    pub fn time_constants(mut self, time_constants: Vec<f64>) -> Self {
        self.time_constants = Some(time_constants);
        self
    }

    pub fn recurrent<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recurrent = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn rbf(mut self, distance: Distance, basis: Basis, parameter: f64) -> Self {
        self.rbf = RbfSpec {
            distance,
            basis,
            parameter,
        };
        self
    }

    pub fn is_delayed(&self, target: &str) -> bool {
        self.delayed.iter().any(|d| d == target)
    }
}

/// `(name, size, kind, activation, sensor tag or "", outputs, delayed)`
impl<'a> From<(&'a str, usize, LayerKind, Activation, &'a str, &'a [&'a str], &'a [&'a str])>
    for LayerSpec
{
    fn from(
        (name, size, kind, activation, sensor, outputs, delayed): (
            &'a str,
            usize,
            LayerKind,
            Activation,
            &'a str,
            &'a [&'a str],
            &'a [&'a str],
        ),
    ) -> Self {
        let mut spec = LayerSpec::new(name, size, kind)
            .activation(activation)
            .outputs(outputs.iter().copied())
            .delayed(delayed.iter().copied());
        if !sensor.is_empty() {
            spec = spec.sensor(sensor);
        }
        spec
    }
}
