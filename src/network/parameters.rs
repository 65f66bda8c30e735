//! Flat parameter vectors for the evolutionary search.
//!
//! Every non-input layer contributes one vector, in declaration order, laid
//! out as its own `update_parameters` expects.

use super::Network;
use crate::error::{NetworkError, OverlongParameterWarning, Result};

impl Network {
    /// `(layer name, flat parameters)` for every non-input layer
    pub fn return_parameters_as_vector(&self) -> Vec<(String, Vec<f64>)> {
        self.parameter_layers()
            .map(|i| {
                let layer = &self.layers[i];
                (layer.name().to_string(), layer.return_parameters())
            })
            .collect()
    }

    /// Load one vector per non-input layer, all or nothing.
    ///
    /// Short lists or vectors fail with a dimension error and leave the
    /// network unchanged. Surplus entries and values are ignored and
    /// reported.
    pub fn load_parameters_from_vector(&mut self, params: &[Vec<f64>]) -> Result<Vec<OverlongParameterWarning>> {
        let targets: Vec<usize> = self.parameter_layers().collect();
        if params.len() < targets.len() {
            return Err(NetworkError::dimension(
                "network parameter list",
                [targets.len()],
                [params.len()],
            ));
        }

        let mut warnings: Vec<OverlongParameterWarning> =
            OverlongParameterWarning::check("network", targets.len(), params.len())
                .into_iter()
                .collect();

        let mut staged = Vec::with_capacity(targets.len());
        for (&i, values) in targets.iter().zip(params) {
            let mut layer = self.layers[i].clone();
            if let Some(warning) = layer.update_parameters(values)? {
                warnings.push(warning);
            }
            staged.push((i, layer));
        }

        for (i, layer) in staged {
            self.layers[i] = layer;
        }
        log::debug!("loaded parameters into {} layers", targets.len());
        Ok(warnings)
    }

    /// Update a single layer, input layers included
    pub fn set_layer_parameters(&mut self, name: &str, params: &[f64]) -> Result<Option<OverlongParameterWarning>> {
        let index = self.index_of(name)?;
        self.layers[index].update_parameters(params)
    }

    /// Total length of the non-input parameter vectors
    pub fn parameter_count(&self) -> usize {
        self.parameter_layers()
            .map(|i| self.layers[i].parameter_count())
            .sum()
    }

    fn parameter_layers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.layers.len()).filter(|&i| !self.topology.is_input_index(i))
    }
}
