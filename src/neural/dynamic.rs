//! Dynamic layer: a time delay line on the upstream input, zero or more
//! recurrent taps, an affine map and an activation.
//!
//! ```text
//! delayed = delay(x)
//! output  = activation(W·delayed + b + Σ tap_i())
//! ```

use super::activation::{Activation, ActivationFunction};
use super::arrays::{self, ParameterReader};
use super::delay::TimeDelay;
use super::recurrence::TimeRecurrence;
use crate::error::{NetworkError, OverlongParameterWarning, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DynamicLayer {
    name: String,
    delay: TimeDelay,
    recurrences: Vec<TimeRecurrence>,
    #[serde(with = "arrays::matrix")]
    weights: Array2<f64>,
    #[serde(with = "arrays::vector")]
    biases: Array1<f64>,
    activation: Activation,
}

impl DynamicLayer {
    /// `recurrent_dims` lists the size of each recurrent source, in order
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        input_dim: usize,
        output_dim: usize,
        delay_dim: usize,
        recurrent_dims: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let delay = TimeDelay::new(input_dim, delay_dim, rng);
        let recurrences = recurrent_dims
            .iter()
            .map(|&dim| TimeRecurrence::new(dim, output_dim, rng))
            .collect();

        Self {
            name: name.into(),
            delay,
            recurrences,
            weights: arrays::random_matrix(rng, output_dim, input_dim),
            biases: arrays::random_vector(rng, output_dim),
            activation,
        }
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

    pub fn delay_dim(&self) -> usize {
        self.delay.delay_dim()
    }

    pub fn recurrent_count(&self) -> usize {
        self.recurrences.len()
    }

    pub fn forward(&mut self, input: &Array1<f64>) -> Result<Array1<f64>> {
        arrays::check_vector(&format!("{} input", self.name), self.input_dim(), input)?;

        let delayed = self.delay.forward(input)?;
        let mut pre_activation = self.weights.dot(&delayed) + &self.biases;
        for tap in &self.recurrences {
            pre_activation += &tap.forward();
        }
        Ok(self.activation.calculate_activation(&pre_activation))
    }

    /// Push the value replayed by recurrent tap `index` on the next forward
    pub fn set_recurrent_input(&mut self, index: usize, input: &Array1<f64>) -> Result<()> {
        let name = &self.name;
        let tap = self
            .recurrences
            .get_mut(index)
            .ok_or_else(|| NetworkError::configuration(format!("{} has no recurrent tap {}", name, index)))?;
        tap.set_input(input)
    }

    pub fn parameter_count(&self) -> usize {
        self.delay.delay_dim()
            + self.recurrences.iter().map(|t| t.weights().len()).sum::<usize>()
            + self.weights.len()
            + self.biases.len()
            + 2
    }

    /// Load delay weights, each recurrent matrix in order, `W`, `b`, then
    /// activation `(gain, bias)`
    pub fn update_parameters(&mut self, params: &[f64]) -> Result<Option<OverlongParameterWarning>> {
        let (rows, cols) = self.weights.dim();
        let mut reader = ParameterReader::new(&self.name, params, self.parameter_count())?;

        let delay_weights = reader.vector(self.delay.delay_dim());
        let recurrent_weights: Vec<Array2<f64>> = self
            .recurrences
            .iter()
            .map(|tap| reader.matrix(tap.output_dim(), tap.input_dim()))
            .collect();
        let weights = reader.matrix(rows, cols);
        let biases = reader.vector(rows);
        let (gain, bias) = reader.pair();
        let warning = reader.finish();

        self.delay.set_weights(delay_weights)?;
        for (tap, matrix) in self.recurrences.iter_mut().zip(recurrent_weights) {
            tap.set_weights(matrix)?;
        }
        self.weights = weights;
        self.biases = biases;
        self.activation.set_parameters(gain, bias);
        Ok(warning)
    }

    pub fn return_parameters(&self) -> Vec<f64> {
        let (gain, bias) = self.activation.parameters();
        let mut params: Vec<f64> = self.delay.weights().to_vec();
        for tap in &self.recurrences {
            params.extend(tap.weights().iter().copied());
        }
        params.extend(self.weights.iter().copied());
        params.extend(self.biases.iter().copied());
        params.extend([gain, bias]);
        params
    }

    pub fn reset_state(&mut self) {
        self.delay.reset();
        for tap in &mut self.recurrences {
            tap.reset();
        }
    }

    /// Delay line, each tap in order, then `W` and `b`
    pub(crate) fn block_shapes(&self) -> Vec<&[usize]> {
        let mut shapes = self.delay.block_shapes();
        for tap in &self.recurrences {
            shapes.extend(tap.block_shapes());
        }
        shapes.extend([self.weights.shape(), self.biases.shape()]);
        shapes
    }

    pub(crate) fn check_consistent(&self) -> Result<()> {
        let rows = self.output_dim();
        self.delay.check_consistent()?;
        if self.delay.input_dim() != self.input_dim() {
            return Err(NetworkError::dimension(
                format!("{} delay window", self.name),
                [self.delay_dim(), self.input_dim()],
                [self.delay_dim(), self.delay.input_dim()],
            ));
        }
        arrays::check_vector(&format!("{} bias", self.name), rows, &self.biases)?;
        for tap in &self.recurrences {
            tap.check_consistent()?;
            if tap.output_dim() != rows {
                return Err(NetworkError::dimension(
                    format!("{} recurrent weights", self.name),
                    [rows, tap.input_dim()],
                    [tap.output_dim(), tap.input_dim()],
                ));
            }
        }
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

    pub fn delay_weights(&self) -> &Array1<f64> {
        self.delay.weights()
    }

    pub fn set_delay_weights(&mut self, weights: Array1<f64>) -> Result<()> {
        self.delay.set_weights(weights)
    }

    pub fn recurrent_weights(&self, index: usize) -> Option<&Array2<f64>> {
        self.recurrences.get(index).map(TimeRecurrence::weights)
    }

    pub fn set_recurrent_weights(&mut self, index: usize, weights: Array2<f64>) -> Result<()> {
        let name = &self.name;
        self.recurrences
            .get_mut(index)
            .ok_or_else(|| NetworkError::configuration(format!("{} has no recurrent tap {}", name, index)))?
            .set_weights(weights)
    }

    pub fn activation_parameters(&self) -> (f64, f64) {
        self.activation.parameters()
    }

    pub fn set_activation_parameters(&mut self, gain: f64, bias: f64) {
        self.activation.set_parameters(gain, bias);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn layer(recurrent: &[usize]) -> DynamicLayer {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        DynamicLayer::new("dyn", 2, 2, 2, recurrent, Activation::linear(), &mut rng)
    }

    #[test]
    fn test_forward_composes_delay_affine_and_taps() {
        let mut layer = layer(&[1]);
        layer.set_delay_weights(array![1.0, 0.5]).unwrap();
        layer.set_weights(array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        layer.set_biases(array![0.0, 1.0]).unwrap();
        layer.set_recurrent_weights(0, array![[2.0], [3.0]]).unwrap();

        // empty window, no recurrent input yet
        let y = layer.forward(&array![2.0, 4.0]).unwrap();
        assert_eq!(y, array![2.0, 5.0]);

        layer.set_recurrent_input(0, &array![1.0]).unwrap();
        let y = layer.forward(&array![0.0, 0.0]).unwrap();
        // delayed = 0 + 0.5 * [2, 4]
        assert_eq!(y, array![1.0 + 2.0, 2.0 + 1.0 + 3.0]);
    }

    #[test]
    fn test_parameter_layout() {
        let mut layer = layer(&[1, 2]);
        // delay(2) + tap0(2x1) + tap1(2x2) + W(2x2) + b(2) + act(2)
        assert_eq!(layer.parameter_count(), 2 + 2 + 4 + 4 + 2 + 2);

        let params: Vec<f64> = (0..16).map(|i| i as f64).collect();
        layer.update_parameters(&params).unwrap();

        assert_eq!(layer.delay_weights(), &array![0.0, 1.0]);
        assert_eq!(layer.recurrent_weights(0).unwrap(), &array![[2.0], [3.0]]);
        assert_eq!(layer.recurrent_weights(1).unwrap(), &array![[4.0, 5.0], [6.0, 7.0]]);
        assert_eq!(layer.weights(), &array![[8.0, 9.0], [10.0, 11.0]]);
        assert_eq!(layer.biases(), &array![12.0, 13.0]);
        assert_eq!(layer.activation_parameters(), (14.0, 15.0));
        assert_eq!(layer.return_parameters(), params);
    }

    #[test]
    fn test_short_parameters_rejected() {
        let mut layer = layer(&[1]);
        let before = layer.return_parameters();
        assert!(layer.update_parameters(&before[..before.len() - 1]).is_err());
        assert_eq!(layer.return_parameters(), before);
    }

    #[test]
    fn test_unknown_tap_rejected() {
        let mut layer = layer(&[]);
        assert!(layer.set_recurrent_input(0, &array![1.0]).is_err());
    }

    #[test]
    fn test_reset_state_clears_memory() {
        let mut layer = layer(&[1]);
        layer.set_delay_weights(array![0.0, 1.0]).unwrap();
        layer.set_recurrent_weights(0, array![[0.0], [0.0]]).unwrap();
        layer.set_biases(array![0.0, 0.0]).unwrap();

        layer.forward(&array![5.0, 5.0]).unwrap();
        layer.reset_state();
        // only the previous (now cleared) input would reach the output
        let y = layer.forward(&array![1.0, 1.0]).unwrap();
        assert_eq!(y, array![0.0, 0.0]);
    }
}
