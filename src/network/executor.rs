//! One simulation tick over the leveled graph.

use super::topology::{ReadMode, Topology};
use super::{ExecutionMode, Network, SensorInputs, TerminalOutputs};
use crate::error::{NetworkError, Result};
use crate::neural::Layer;
use ndarray::Array1;
use rayon::prelude::*;

impl Network {
    /// Compute every layer once and return the summed terminal outputs.
    ///
    /// Input layers read `sensor_inputs[name]`, then `sensor_inputs[tag]`,
    /// and fall back to zeros. Sensor vectors are checked before any layer
    /// runs, so a rejected call leaves the network untouched. An error
    /// raised by a layer after that point leaves earlier levels advanced;
    /// call [`reset_state`](Network::reset_state) before stepping again.
    pub fn step(&mut self, sensor_inputs: &SensorInputs) -> Result<TerminalOutputs> {
        let topology = &self.topology;
        let n = self.layers.len();

        // Sensor vectors are checked before any layer mutates its memory
        let mut sensors: Vec<Option<Array1<f64>>> = vec![None; n];
        for (i, spec) in topology.specs().iter().enumerate() {
            if !topology.is_input_index(i) {
                continue;
            }
            let reading = sensor_inputs
                .get(&spec.name)
                .or_else(|| spec.sensor.as_ref().and_then(|tag| sensor_inputs.get(tag)));
            let vector = match reading {
                Some(values) if values.len() != spec.size => {
                    return Err(NetworkError::dimension(
                        format!("{} sensor input", spec.name),
                        [spec.size],
                        [values.len()],
                    ));
                }
                Some(values) => Array1::from_vec(values.clone()),
                None => Array1::zeros(spec.size),
            };
            sensors[i] = Some(vector);
        }

        let mut current: Vec<Option<Array1<f64>>> = vec![None; n];
        for level in topology.level_indices() {
            let mut inputs: Vec<Option<Array1<f64>>> = vec![None; n];
            for &i in level {
                inputs[i] = Some(match sensors[i].take() {
                    Some(sensor) => sensor,
                    None => gather_input(topology, i, &current, &self.state),
                });
            }

            let state = &self.state;
            let results: Vec<(usize, Result<Array1<f64>>)> = match self.mode {
                ExecutionMode::Sequential => self
                    .layers
                    .iter_mut()
                    .zip(inputs)
                    .enumerate()
                    .filter_map(|(i, (layer, input))| {
                        input.map(|x| (i, evaluate(topology, i, layer, &x, state)))
                    })
                    .collect(),
                ExecutionMode::Parallel => self
                    .layers
                    .par_iter_mut()
                    .zip(inputs.into_par_iter())
                    .enumerate()
                    .filter_map(|(i, (layer, input))| {
                        input.map(|x| (i, evaluate(topology, i, layer, &x, state)))
                    })
                    .collect(),
            };

            for (i, output) in results {
                current[i] = Some(output?);
            }
        }

        let outputs = assemble_terminals(topology, &current)?;

        self.state = current
            .into_iter()
            .zip(&self.layers)
            .map(|(output, layer)| output.unwrap_or_else(|| Array1::zeros(layer.output_dim())))
            .collect();
        self.tick += 1;
        log::debug!("tick {} complete, {} terminal outputs", self.tick, outputs.len());
        Ok(outputs)
    }
}

/// Concatenate upstream outputs in declared-connection order
fn gather_input(
    topology: &Topology,
    index: usize,
    current: &[Option<Array1<f64>>],
    previous: &[Array1<f64>],
) -> Array1<f64> {
    let mut input = Vec::with_capacity(topology.input_dim_at(index));
    for edge in topology.edges(index) {
        let source = match (edge.mode, &current[edge.source]) {
            (ReadMode::Fresh, Some(fresh)) => fresh,
            _ => &previous[edge.source],
        };
        input.extend(source.iter().copied());
    }
    Array1::from_vec(input)
}

fn evaluate(
    topology: &Topology,
    index: usize,
    layer: &mut Layer,
    input: &Array1<f64>,
    previous: &[Array1<f64>],
) -> Result<Array1<f64>> {
    if let Some(dynamic) = layer.as_dynamic_mut() {
        for (tap, &source) in topology.recurrent_sources(index).iter().enumerate() {
            dynamic.set_recurrent_input(tap, &previous[source])?;
        }
    }
    layer.forward(input)
}

fn assemble_terminals(topology: &Topology, current: &[Option<Array1<f64>>]) -> Result<TerminalOutputs> {
    topology
        .terminals()
        .iter()
        .map(|terminal| {
            let mut sum = Array1::<f64>::zeros(terminal.size);
            for &source in &terminal.sources {
                let output = current[source].as_ref().ok_or_else(|| {
                    NetworkError::configuration(format!(
                        "terminal {} has no output from source {}",
                        terminal.name,
                        topology.specs()[source].name
                    ))
                })?;
                if output.len() != terminal.size {
                    return Err(NetworkError::configuration(format!(
                        "terminal {} expects {} values, {} produced {}",
                        terminal.name,
                        terminal.size,
                        topology.specs()[source].name,
                        output.len()
                    )));
                }
                sum += output;
            }
            Ok((terminal.name.clone(), sum.to_vec()))
        })
        .collect()
}
