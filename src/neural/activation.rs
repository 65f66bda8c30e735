//! Activation functions consumed by the affine layers.
//!
//! Layers only rely on the [`ActivationFunction`] capability: activate a
//! vector given a gain and a bias, and get/set those two parameters.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Capability contract for layer activations
pub trait ActivationFunction {
    /// Apply the activation element-wise
    fn calculate_activation(&self, input: &Array1<f64>) -> Array1<f64>;

    /// Current `(gain, bias)` pair
    fn parameters(&self) -> (f64, f64);

    /// Replace the `(gain, bias)` pair
    fn set_parameters(&mut self, gain: f64, bias: f64);
}

/// Shape of the transfer curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    #[default]
    #[serde(alias = "identity")]
    Linear,
    Sigmoid,
    Tanh,
    Relu,
    Step,
    Sine,
}

impl ActivationKind {
    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Linear => x,
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Relu => x.max(0.0),
            Self::Step => {
                if x >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Sine => x.sin(),
        }
    }
}

/// Stock activation: `f(gain * (x - bias))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    #[serde(default)]
    pub kind: ActivationKind,
    #[serde(default = "default_gain")]
    pub gain: f64,
    #[serde(default)]
    pub bias: f64,
}

fn default_gain() -> f64 {
    1.0
}

impl Default for Activation {
    fn default() -> Self {
        Self::new(ActivationKind::Linear)
    }
}

impl Activation {
    pub fn new(kind: ActivationKind) -> Self {
        Self {
            kind,
            gain: 1.0,
            bias: 0.0,
        }
    }

    pub fn linear() -> Self {
        Self::new(ActivationKind::Linear)
    }

    pub fn sigmoid() -> Self {
        Self::new(ActivationKind::Sigmoid)
    }

    pub fn tanh() -> Self {
        Self::new(ActivationKind::Tanh)
    }

    pub fn with_parameters(mut self, gain: f64, bias: f64) -> Self {
        self.gain = gain;
        self.bias = bias;
        self
    }
}

impl ActivationFunction for Activation {
    fn calculate_activation(&self, input: &Array1<f64>) -> Array1<f64> {
        let (kind, gain, bias) = (self.kind, self.gain, self.bias);
        input.mapv(|x| kind.apply(gain * (x - bias)))
    }

    fn parameters(&self) -> (f64, f64) {
        (self.gain, self.bias)
    }

    fn set_parameters(&mut self, gain: f64, bias: f64) {
        self.gain = gain;
        self.bias = bias;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_default_linear_is_identity() {
        let act = Activation::default();
        let x = array![-2.0, 0.0, 3.5];
        assert_eq!(act.calculate_activation(&x), x);
    }

    #[test]
    fn test_gain_and_bias() {
        let act = Activation::linear().with_parameters(2.0, 1.0);
        let y = act.calculate_activation(&array![3.0]);
        assert!((y[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_midpoint_at_bias() {
        let act = Activation::sigmoid().with_parameters(5.0, 0.5);
        let y = act.calculate_activation(&array![0.5]);
        assert!((y[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_step_and_relu() {
        let step = Activation::new(ActivationKind::Step);
        assert_eq!(step.calculate_activation(&array![-0.1, 0.0, 2.0]), array![0.0, 1.0, 1.0]);

        let relu = Activation::new(ActivationKind::Relu);
        assert_eq!(relu.calculate_activation(&array![-1.0, 2.0]), array![0.0, 2.0]);
    }

    #[test]
    fn test_set_parameters() {
        let mut act = Activation::tanh();
        act.set_parameters(0.5, -1.0);
        assert_eq!(act.parameters(), (0.5, -1.0));
    }

    #[test]
    fn test_yaml_identity_alias() {
        let act: Activation = serde_yaml::from_str("kind: identity").unwrap();
        assert_eq!(act.kind, ActivationKind::Linear);
        assert_eq!(act.parameters(), (1.0, 0.0));
    }
}
