//! Time delay line: a learned weighted combination of the last
//! `delay_dim` inputs, channel by channel. No activation.

use super::arrays;
use crate::error::Result;
use ndarray::{s, Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeDelay {
    /// Weights over the window, newest first
    #[serde(with = "arrays::vector")]
    weights: Array1<f64>,
    /// Window of past inputs, row 0 is the newest
    #[serde(with = "arrays::matrix")]
    window: Array2<f64>,
}

impl TimeDelay {
    /// A `delay_dim` of 1 degenerates to a scaled pass-through
    pub fn new<R: Rng + ?Sized>(input_dim: usize, delay_dim: usize, rng: &mut R) -> Self {
        Self {
            weights: arrays::random_vector(rng, delay_dim),
            window: Array2::zeros((delay_dim, input_dim)),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.window.ncols()
    }

    pub fn delay_dim(&self) -> usize {
        self.weights.len()
    }

    /// Push `input` as the newest row, drop the oldest, return `weights · window`
    pub fn forward(&mut self, input: &Array1<f64>) -> Result<Array1<f64>> {
        arrays::check_vector("time delay input", self.input_dim(), input)?;

        let depth = self.delay_dim();
        if depth > 1 {
            let older = self.window.slice(s![..depth - 1, ..]).to_owned();
            self.window.slice_mut(s![1.., ..]).assign(&older);
        }
        self.window.row_mut(0).assign(input);

        Ok(self.weights.dot(&self.window))
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: Array1<f64>) -> Result<()> {
        arrays::check_vector("time delay weights", self.delay_dim(), &weights)?;
        self.weights = weights;
        Ok(())
    }

    pub fn window(&self) -> &Array2<f64> {
        &self.window
    }

    pub fn reset(&mut self) {
        self.window.fill(0.0);
    }

    pub(crate) fn block_shapes(&self) -> Vec<&[usize]> {
        vec![self.weights.shape(), self.window.shape()]
    }

    pub(crate) fn check_consistent(&self) -> Result<()> {
        arrays::check_matrix("time delay window", (self.delay_dim(), self.input_dim()), &self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn delay(input_dim: usize, delay_dim: usize) -> TimeDelay {
        TimeDelay::new(input_dim, delay_dim, &mut ChaCha8Rng::seed_from_u64(3))
    }

    #[test]
    fn test_single_tap_is_scaled_identity() {
        let mut line = delay(3, 1);
        line.set_weights(array![2.5]).unwrap();

        for x in [array![1.0, -2.0, 0.5], array![4.0, 0.0, -1.0]] {
            let y = line.forward(&x).unwrap();
            assert_eq!(y, &x * 2.5);
        }
    }

    #[test]
    fn test_window_slides_newest_first() {
        let mut line = delay(2, 3);
        line.set_weights(array![1.0, 10.0, 100.0]).unwrap();

        line.forward(&array![1.0, 2.0]).unwrap();
        line.forward(&array![3.0, 4.0]).unwrap();
        let y = line.forward(&array![5.0, 6.0]).unwrap();

        assert_eq!(line.window(), &array![[5.0, 6.0], [3.0, 4.0], [1.0, 2.0]]);
        assert_eq!(y, array![5.0 + 30.0 + 100.0, 6.0 + 40.0 + 200.0]);

        // oldest row falls off
        let y = line.forward(&array![0.0, 0.0]).unwrap();
        assert_eq!(y, array![50.0 + 300.0, 60.0 + 400.0]);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut line = delay(2, 2);
        line.forward(&array![1.0, 1.0]).unwrap();
        line.reset();
        assert!(line.window().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_wrong_input() {
        let mut line = delay(2, 2);
        assert!(line.forward(&array![1.0]).is_err());
        assert!(line.set_weights(array![1.0]).is_err());
    }
}
