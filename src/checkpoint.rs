//! Parameter persistence: the whole layer collection, internal state
//! included, plus the tick state it ran against, as a tagged bincode file.

use crate::error::PersistenceError;
use crate::network::Network;
use crate::neural::Layer;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"EANN";

/// Every layer of a network at one point in time
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    /// Version for compatibility checking
    pub version: u32,
    /// Integration step the CTRNN layers were built for
    pub time_interval: f64,
    /// Completed ticks when the snapshot was taken
    pub tick: u64,
    /// Layers in declaration order
    pub layers: Vec<Layer>,
    /// Each layer's output from the last completed tick
    pub outputs: Vec<Vec<f64>>,
}

impl ParameterSnapshot {
    /// Current snapshot version
    pub const VERSION: u32 = 2;

    pub fn capture(network: &Network) -> Self {
        Self {
            version: Self::VERSION,
            time_interval: network.time_interval(),
            tick: network.tick(),
            layers: network.layers().to_vec(),
            outputs: network.tick_state().iter().map(Array1::to_vec).collect(),
        }
    }

    /// Save snapshot to binary file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        let encoded = bincode::serialize(self)?;
        writer.write_all(&encoded)?;
        writer.flush()?;

        Ok(())
    }

    /// Load snapshot from binary file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(PersistenceError::InvalidFormat("invalid magic bytes".to_string()));
        }

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let snapshot: ParameterSnapshot = bincode::deserialize(&buffer)?;

        if snapshot.version != Self::VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::VERSION,
                found: snapshot.version,
            });
        }
        snapshot.check_consistent()?;

        Ok(snapshot)
    }

    /// Approximate encoded size in bytes
    pub fn size_bytes(&self) -> usize {
        bincode::serialized_size(self).unwrap_or(0) as usize
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    /// Check that the stored layers and outputs agree with each other
    pub fn check_consistent(&self) -> Result<(), PersistenceError> {
        if self.outputs.len() != self.layers.len() {
            return Err(PersistenceError::InvalidFormat(format!(
                "{} stored outputs for {} layers",
                self.outputs.len(),
                self.layers.len()
            )));
        }
        for (layer, output) in self.layers.iter().zip(&self.outputs) {
            layer
                .check_consistent()
                .map_err(|e| PersistenceError::InvalidFormat(e.to_string()))?;
            if output.len() != layer.output_dim() {
                return Err(PersistenceError::InvalidFormat(format!(
                    "stored output of {} has {} values, layer has {} neurons",
                    layer.name(),
                    output.len(),
                    layer.output_dim()
                )));
            }
        }
        Ok(())
    }

    /// Check that every stored layer fits the live network's layer of the
    /// same position, block by block
    pub fn check_compatible(&self, network: &Network) -> Result<(), PersistenceError> {
        if (self.time_interval - network.time_interval()).abs() > f64::EPSILON {
            return Err(PersistenceError::TopologyMismatch(format!(
                "snapshot integrates with dt {}, network with {}",
                self.time_interval,
                network.time_interval()
            )));
        }
        if self.layers.len() != network.number_of_layers() {
            return Err(PersistenceError::TopologyMismatch(format!(
                "snapshot has {} layers, network has {}",
                self.layers.len(),
                network.number_of_layers()
            )));
        }
        for (stored, live) in self.layers.iter().zip(network.layers()) {
            if stored.name() != live.name() || !stored.same_shape(live) {
                return Err(PersistenceError::TopologyMismatch(format!(
                    "stored {} {} with blocks {:?} does not fit {} {} with blocks {:?}",
                    stored.kind(),
                    stored.name(),
                    stored.block_shapes(),
                    live.kind(),
                    live.name(),
                    live.block_shapes()
                )));
            }
        }
        Ok(())
    }
}

impl Network {
    /// Write every layer, parameters and internal state, to `path`
    pub fn save_parameters_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let snapshot = ParameterSnapshot::capture(self);
        snapshot.save(&path)?;
        log::info!(
            "saved {} layers ({} bytes) to {}",
            snapshot.layers.len(),
            snapshot.size_bytes(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Replace the layer collection and tick state with the ones stored at
    /// `path`, so stepping resumes where the saved network stopped
    pub fn load_parameters_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PersistenceError> {
        let snapshot = ParameterSnapshot::load(&path)?;
        snapshot.check_compatible(self)?;
        let count = snapshot.layers.len();
        let state = snapshot.outputs.into_iter().map(Array1::from_vec).collect();
        self.restore(snapshot.layers, state, snapshot.tick);
        log::info!(
            "loaded {} layers at tick {} from {}",
            count,
            snapshot.tick,
            path.as_ref().display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::LayerSpec;
    use crate::neural::LayerKind;

    fn network(seed: u64) -> Network {
        let specs = vec![
            LayerSpec::new("in", 2, LayerKind::Static).outputs(["d"]),
            LayerSpec::new("d", 3, LayerKind::Dynamic).delay(2).recurrent(["d"]).outputs(["c"]),
            LayerSpec::new("c", 2, LayerKind::Ctrnn).outputs(["r"]),
            LayerSpec::new("r", 2, LayerKind::Rbf).outputs(["motor"]),
        ];
        Network::new_with_seed(specs, 0.1, seed).unwrap()
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let source = network(1);
        let mut target = network(2);
        let temp_path = "/tmp/test_evonet_snapshot.bin";

        source.save_parameters_to_file(temp_path).unwrap();
        target.load_parameters_from_file(temp_path).unwrap();

        assert_eq!(target.return_parameters_as_vector(), source.return_parameters_as_vector());
        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_rejects_bad_magic() {
        let temp_path = "/tmp/test_evonet_bad_magic.bin";
        std::fs::write(temp_path, b"PRMD0000").unwrap();

        let err = ParameterSnapshot::load(temp_path).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidFormat(_)));
        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_rejects_other_topology() {
        let temp_path = "/tmp/test_evonet_other_topology.bin";
        network(1).save_parameters_to_file(temp_path).unwrap();

        let specs = vec![LayerSpec::new("in", 2, LayerKind::Static).outputs(["motor"])];
        let mut other = Network::new_with_seed(specs, 0.1, 1).unwrap();
        let before = other.return_parameters_as_vector();

        let err = other.load_parameters_from_file(temp_path).unwrap_err();
        assert!(matches!(err, PersistenceError::TopologyMismatch(_)));
        assert_eq!(other.return_parameters_as_vector(), before);
        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_rejects_other_wiring_with_same_count() {
        let temp_path = "/tmp/test_evonet_other_wiring.bin";
        let saved = vec![
            LayerSpec::new("in", 1, LayerKind::Static).outputs(["d"]),
            LayerSpec::new("s", 1, LayerKind::Static),
            LayerSpec::new("d", 2, LayerKind::Dynamic).delay(4),
        ];
        let live = vec![
            LayerSpec::new("in", 1, LayerKind::Static).outputs(["d"]),
            LayerSpec::new("s", 1, LayerKind::Static),
            LayerSpec::new("d", 2, LayerKind::Dynamic).delay(2).recurrent(["s"]),
        ];
        let source = Network::new_with_seed(saved, 0.1, 1).unwrap();
        let mut target = Network::new_with_seed(live, 0.1, 2).unwrap();
        assert_eq!(source.parameter_count(), target.parameter_count());
        source.save_parameters_to_file(temp_path).unwrap();

        let before = target.return_parameters_as_vector();
        let err = target.load_parameters_from_file(temp_path).unwrap_err();
        assert!(matches!(err, PersistenceError::TopologyMismatch(_)));
        assert_eq!(target.return_parameters_as_vector(), before);
        assert!(target.step(&Default::default()).is_ok());
        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_rejects_inconsistent_layer_state() {
        let temp_path = "/tmp/test_evonet_inconsistent.bin";
        let mut snapshot = ParameterSnapshot::capture(&network(1));

        // integrator state one value longer than the layer
        let mut encoded = serde_json::to_value(&snapshot.layers[2]).unwrap();
        encoded["Ctrnn"]["previous_output"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!(0.0));
        snapshot.layers[2] = serde_json::from_value(encoded).unwrap();
        snapshot.save(temp_path).unwrap();

        let err = ParameterSnapshot::load(temp_path).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidFormat(_)));

        let mut target = network(2);
        assert!(target.load_parameters_from_file(temp_path).is_err());
        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_rejects_outputs_of_wrong_length() {
        let mut snapshot = ParameterSnapshot::capture(&network(1));
        snapshot.outputs[1].push(0.0);
        assert!(matches!(snapshot.check_consistent(), Err(PersistenceError::InvalidFormat(_))));

        snapshot.outputs.pop();
        assert!(matches!(snapshot.check_consistent(), Err(PersistenceError::InvalidFormat(_))));
    }

    #[test]
    fn test_load_resumes_tick_state() {
        let temp_path = "/tmp/test_evonet_resume.bin";
        let mut source = network(1);
        let mut inputs = crate::network::SensorInputs::new();
        inputs.insert("in".to_string(), vec![0.3, -0.7]);
        for _ in 0..7 {
            source.step(&inputs).unwrap();
        }
        source.save_parameters_to_file(temp_path).unwrap();

        let mut target = network(2);
        target.load_parameters_from_file(temp_path).unwrap();
        assert_eq!(target.tick(), 7);
        assert_eq!(target.last_outputs(), source.last_outputs());

        for _ in 0..3 {
            assert_eq!(target.step(&inputs).unwrap(), source.step(&inputs).unwrap());
        }
        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ParameterSnapshot::load("/tmp/evonet_does_not_exist.bin").unwrap_err();
        assert!(matches!(err, PersistenceError::Io(_)));
    }

    #[test]
    fn test_snapshot_size() {
        let snapshot = ParameterSnapshot::capture(&network(3));
        assert!(snapshot.size_bytes() > snapshot.parameter_count() * 8);
        assert_eq!(snapshot.layers.len(), 4);
    }
}
