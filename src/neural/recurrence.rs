//! Recurrent tap: replays `W·stored_input`, where the stored input is
//! pushed in by the owner before the layer computes its output.

use super::arrays;
use crate::error::Result;
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeRecurrence {
    /// (owner output × source size)
    #[serde(with = "arrays::matrix")]
    weights: Array2<f64>,
    #[serde(with = "arrays::vector")]
    stored_input: Array1<f64>,
}

impl TimeRecurrence {
    pub fn new<R: Rng + ?Sized>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        Self {
            weights: arrays::random_matrix(rng, output_dim, input_dim),
            stored_input: Array1::zeros(input_dim),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    #[inline]
    pub fn forward(&self) -> Array1<f64> {
        self.weights.dot(&self.stored_input)
    }

    pub fn set_input(&mut self, input: &Array1<f64>) -> Result<()> {
        arrays::check_vector("recurrent input", self.input_dim(), input)?;
        self.stored_input.assign(input);
        Ok(())
    }

    pub fn stored_input(&self) -> &Array1<f64> {
        &self.stored_input
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: Array2<f64>) -> Result<()> {
        arrays::check_matrix("recurrent weights", self.weights.dim(), &weights)?;
        self.weights = weights;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.stored_input.fill(0.0);
    }

    pub(crate) fn block_shapes(&self) -> Vec<&[usize]> {
        vec![self.weights.shape(), self.stored_input.shape()]
    }

    pub(crate) fn check_consistent(&self) -> Result<()> {
        arrays::check_vector("recurrent input", self.input_dim(), &self.stored_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_replays_stored_input() {
        let mut tap = TimeRecurrence::new(2, 3, &mut ChaCha8Rng::seed_from_u64(5));
        tap.set_weights(array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();

        assert_eq!(tap.forward(), array![0.0, 0.0, 0.0]);

        tap.set_input(&array![2.0, 3.0]).unwrap();
        assert_eq!(tap.forward(), array![2.0, 3.0, 5.0]);
        // replay does not consume the input
        assert_eq!(tap.forward(), array![2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_shape_checks() {
        let mut tap = TimeRecurrence::new(2, 3, &mut ChaCha8Rng::seed_from_u64(5));
        assert!(tap.set_input(&array![1.0]).is_err());
        assert!(tap.set_weights(Array2::zeros((2, 3))).is_err());
    }
}
