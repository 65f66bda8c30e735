//! Static layer: `output = activation(W·x + b)`.

use super::activation::{Activation, ActivationFunction};
use super::arrays::{self, ParameterReader};
use crate::error::{OverlongParameterWarning, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fully connected layer without memory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticLayer {
    name: String,
    #[serde(with = "arrays::matrix")]
    weights: Array2<f64>,
    #[serde(with = "arrays::vector")]
    biases: Array1<f64>,
    activation: Activation,
}

impl StaticLayer {
    /// Create a layer with uniform `[0, 1)` weights and biases
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        input_dim: usize,
        output_dim: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        Self {
            name: name.into(),
            weights: arrays::random_matrix(rng, output_dim, input_dim),
            biases: arrays::random_vector(rng, output_dim),
            activation,
        }
    }

    /// Create a layer from explicit parameters
    pub fn from_parameters(
        name: impl Into<String>,
        weights: Array2<f64>,
        biases: Array1<f64>,
        activation: Activation,
    ) -> Result<Self> {
        let name = name.into();
        arrays::check_vector(&format!("{} bias", name), weights.nrows(), &biases)?;
        Ok(Self {
            name,
            weights,
            biases,
            activation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    /// Compute `activation(W·x + b)`
    pub fn forward(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        arrays::check_vector(&format!("{} input", self.name), self.input_dim(), input)?;
        let pre_activation = self.weights.dot(input) + &self.biases;
        Ok(self.activation.calculate_activation(&pre_activation))
    }

    /// Number of values consumed by [`update_parameters`](Self::update_parameters)
    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len() + 2
    }

    /// Load `W` (row-major), then `b`, then activation `(gain, bias)`
    pub fn update_parameters(&mut self, params: &[f64]) -> Result<Option<OverlongParameterWarning>> {
        let (rows, cols) = self.weights.dim();
        let mut reader = ParameterReader::new(&self.name, params, self.parameter_count())?;
        let weights = reader.matrix(rows, cols);
        let biases = reader.vector(rows);
        let (gain, bias) = reader.pair();
        let warning = reader.finish();

        self.weights = weights;
        self.biases = biases;
        self.activation.set_parameters(gain, bias);
        Ok(warning)
    }

    /// Inverse of [`update_parameters`](Self::update_parameters)
    pub fn return_parameters(&self) -> Vec<f64> {
        let (gain, bias) = self.activation.parameters();
        self.weights
            .iter()
            .chain(self.biases.iter())
            .copied()
            .chain([gain, bias])
            .collect()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: Array2<f64>) -> Result<()> {
        arrays::check_matrix(&format!("{} weights", self.name), self.weights.dim(), &weights)?;
        self.weights = weights;
        Ok(())
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.biases
    }

    pub fn set_biases(&mut self, biases: Array1<f64>) -> Result<()> {
        arrays::check_vector(&format!("{} bias", self.name), self.biases.len(), &biases)?;
        self.biases = biases;
        Ok(())
    }

    pub(crate) fn block_shapes(&self) -> Vec<&[usize]> {
        vec![self.weights.shape(), self.biases.shape()]
    }

    /// Blocks agree with each other; only decoded layers can fail this
    pub(crate) fn check_consistent(&self) -> Result<()> {
        arrays::check_vector(&format!("{} bias", self.name), self.output_dim(), &self.biases)
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    pub fn activation_parameters(&self) -> (f64, f64) {
        self.activation.parameters()
    }

    pub fn set_activation_parameters(&mut self, gain: f64, bias: f64) {
        self.activation.set_parameters(gain, bias);
    }
}
