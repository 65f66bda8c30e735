//! Continuous-time recurrent layer integrated with a first-order explicit
//! Euler step:
//!
//! ```text
//! activated = activation(W·x + b)
//! output    = prev·(1 − Δt/τ) + activated·(Δt/τ)
//! ```
//!
//! Time weights outside `(0, 2)` make the integrator unstable. They are
//! accepted but logged.

use super::activation::{Activation, ActivationFunction};
use super::arrays::{self, ParameterReader};
use crate::error::{NetworkError, OverlongParameterWarning, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CtrnnLayer {
    name: String,
    #[serde(with = "arrays::matrix")]
    weights: Array2<f64>,
    #[serde(with = "arrays::vector")]
    biases: Array1<f64>,
    activation: Activation,
    time_interval: f64,
    #[serde(with = "arrays::vector")]
    time_constants: Array1<f64>,
    /// `Δt / τ`, kept in sync with `time_constants`
    #[serde(with = "arrays::vector")]
    time_weights: Array1<f64>,
    #[serde(with = "arrays::vector")]
    previous_output: Array1<f64>,
}

impl CtrnnLayer {
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        input_dim: usize,
        output_dim: usize,
        time_interval: f64,
        time_constants: Array1<f64>,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let name = name.into();
        let time_weights = compute_time_weights(&name, output_dim, time_interval, &time_constants)?;

        Ok(Self {
            weights: arrays::random_matrix(rng, output_dim, input_dim),
            biases: arrays::random_vector(rng, output_dim),
            activation,
            time_interval,
            time_constants,
            time_weights,
            previous_output: Array1::zeros(output_dim),
            name,
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

    pub fn time_interval(&self) -> f64 {
        self.time_interval
    }

    /// Advance the integrator one step and return the new state
    pub fn euler_step(&mut self, input: &Array1<f64>) -> Result<Array1<f64>> {
        arrays::check_vector(&format!("{} input", self.name), self.input_dim(), input)?;

        let activated = self
            .activation
            .calculate_activation(&(self.weights.dot(input) + &self.biases));
        let output = &self.previous_output * &(1.0 - &self.time_weights) + &activated * &self.time_weights;

        self.previous_output.assign(&output);
        Ok(output)
    }

    pub fn parameter_count(&self) -> usize {
        self.time_constants.len() + self.weights.len() + self.biases.len() + 2
    }

    /// Load time constants, `W` (row-major), `b`, then activation `(gain, bias)`
    pub fn update_parameters(&mut self, params: &[f64]) -> Result<Option<OverlongParameterWarning>> {
        let (rows, cols) = self.weights.dim();
        let mut reader = ParameterReader::new(&self.name, params, self.parameter_count())?;
        let time_constants = reader.vector(rows);
        let weights = reader.matrix(rows, cols);
        let biases = reader.vector(rows);
        let (gain, bias) = reader.pair();
        let warning = reader.finish();

        let time_weights = compute_time_weights(&self.name, rows, self.time_interval, &time_constants)?;

        self.time_constants = time_constants;
        self.time_weights = time_weights;
        self.weights = weights;
        self.biases = biases;
        self.activation.set_parameters(gain, bias);
        Ok(warning)
    }

    pub fn return_parameters(&self) -> Vec<f64> {
        let (gain, bias) = self.activation.parameters();
        self.time_constants
            .iter()
            .chain(self.weights.iter())
            .chain(self.biases.iter())
            .copied()
            .chain([gain, bias])
            .collect()
    }

    /// Zero the integrator state
    pub fn reset_state(&mut self) {
        self.previous_output.fill(0.0);
    }

    pub fn previous_output(&self) -> &Array1<f64> {
        &self.previous_output
    }

    pub fn time_constants(&self) -> &Array1<f64> {
        &self.time_constants
    }

    pub fn time_weights(&self) -> &Array1<f64> {
        &self.time_weights
    }

    pub fn set_time_constants(&mut self, time_constants: Array1<f64>) -> Result<()> {
        self.time_weights =
            compute_time_weights(&self.name, self.output_dim(), self.time_interval, &time_constants)?;
        self.time_constants = time_constants;
        Ok(())
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

    /// `W`, `b`, τ, time weights, then the integrator state
    pub(crate) fn block_shapes(&self) -> Vec<&[usize]> {
        vec![
            self.weights.shape(),
            self.biases.shape(),
            self.time_constants.shape(),
            self.time_weights.shape(),
            self.previous_output.shape(),
        ]
    }

    /// Every per-neuron block has one entry per neuron and the time
    /// weights match `Δt / τ`
    pub(crate) fn check_consistent(&self) -> Result<()> {
        let rows = self.output_dim();
        arrays::check_vector(&format!("{} bias", self.name), rows, &self.biases)?;
        arrays::check_vector(&format!("{} time weights", self.name), rows, &self.time_weights)?;
        arrays::check_vector(&format!("{} state", self.name), rows, &self.previous_output)?;
        if !(self.time_interval.is_finite() && self.time_interval > 0.0) {
            return Err(NetworkError::configuration(format!(
                "{}: time interval must be positive, got {}",
                self.name, self.time_interval
            )));
        }
        let expected = compute_time_weights(&self.name, rows, self.time_interval, &self.time_constants)?;
        let drifted = expected
            .iter()
            .zip(self.time_weights.iter())
            .any(|(want, got)| (want - got).abs() > 1e-12 * want.abs().max(1.0));
        if drifted {
            return Err(NetworkError::configuration(format!(
                "{}: time weights do not match time constants",
                self.name
            )));
        }
        Ok(())
    }

    pub fn activation_parameters(&self) -> (f64, f64) {
        self.activation.parameters()
    }

    pub fn set_activation_parameters(&mut self, gain: f64, bias: f64) {
        self.activation.set_parameters(gain, bias);
    }
}

/// Validate τ and derive `Δt / τ`.
///
/// Non-positive or non-finite time constants are rejected outright.
fn compute_time_weights(
    name: &str,
    output_dim: usize,
    time_interval: f64,
    time_constants: &Array1<f64>,
) -> Result<Array1<f64>> {
    arrays::check_vector(&format!("{} time constants", name), output_dim, time_constants)?;

    if let Some(tau) = time_constants.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
        return Err(NetworkError::configuration(format!(
            "{}: time constants must be positive and finite, found {}",
            name, tau
        )));
    }

    let time_weights = time_constants.mapv(|tau| time_interval / tau);
    if time_weights.iter().any(|&w| w <= 0.0 || w >= 2.0) {
        log::warn!(
            "{}: Euler time weights {:?} outside (0, 2), integration may diverge",
            name,
            time_weights.to_vec()
        );
    }
    Ok(time_weights)
}
