//! Closed set of layer variants scheduled by the network.

use super::ctrnn::CtrnnLayer;
use super::dynamic::DynamicLayer;
use super::rbf::RbfLayer;
use super::static_layer::StaticLayer;
use crate::error::{OverlongParameterWarning, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Layer kind as declared in a network definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Static,
    Dynamic,
    Ctrnn,
    Rbf,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Static => "STATIC",
            Self::Dynamic => "DYNAMIC",
            Self::Ctrnn => "CTRNN",
            Self::Rbf => "RBF",
        };
        f.write_str(label)
    }
}

/// A concrete layer owned by a network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Layer {
    Static(StaticLayer),
    Dynamic(DynamicLayer),
    Ctrnn(CtrnnLayer),
    Rbf(RbfLayer),
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Static(_) => LayerKind::Static,
            Self::Dynamic(_) => LayerKind::Dynamic,
            Self::Ctrnn(_) => LayerKind::Ctrnn,
            Self::Rbf(_) => LayerKind::Rbf,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Static(l) => l.name(),
            Self::Dynamic(l) => l.name(),
            Self::Ctrnn(l) => l.name(),
            Self::Rbf(l) => l.name(),
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            Self::Static(l) => l.input_dim(),
            Self::Dynamic(l) => l.input_dim(),
            Self::Ctrnn(l) => l.input_dim(),
            Self::Rbf(l) => l.input_dim(),
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            Self::Static(l) => l.output_dim(),
            Self::Dynamic(l) => l.output_dim(),
            Self::Ctrnn(l) => l.output_dim(),
            Self::Rbf(l) => l.output_dim(),
        }
    }

    /// One tick of computation; CTRNN layers take an Euler step
    pub fn forward(&mut self, input: &Array1<f64>) -> Result<Array1<f64>> {
        match self {
            Self::Static(l) => l.forward(input),
            Self::Dynamic(l) => l.forward(input),
            Self::Ctrnn(l) => l.euler_step(input),
            Self::Rbf(l) => l.forward(input),
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Static(l) => l.parameter_count(),
            Self::Dynamic(l) => l.parameter_count(),
            Self::Ctrnn(l) => l.parameter_count(),
            Self::Rbf(l) => l.parameter_count(),
        }
    }

    pub fn update_parameters(&mut self, params: &[f64]) -> Result<Option<OverlongParameterWarning>> {
        match self {
            Self::Static(l) => l.update_parameters(params),
            Self::Dynamic(l) => l.update_parameters(params),
            Self::Ctrnn(l) => l.update_parameters(params),
            Self::Rbf(l) => l.update_parameters(params),
        }
    }

    pub fn return_parameters(&self) -> Vec<f64> {
        match self {
            Self::Static(l) => l.return_parameters(),
            Self::Dynamic(l) => l.return_parameters(),
            Self::Ctrnn(l) => l.return_parameters(),
            Self::Rbf(l) => l.return_parameters(),
        }
    }

    /// Clear per-tick memory; static and RBF layers have none
    pub fn reset_state(&mut self) {
        match self {
            Self::Dynamic(l) => l.reset_state(),
            Self::Ctrnn(l) => l.reset_state(),
            Self::Static(_) | Self::Rbf(_) => {}
        }
    }

    /// Whether `other` has the same kind, the same shape for every
    /// parameter and state block, and the same fixed functions
    pub fn same_shape(&self, other: &Layer) -> bool {
        let fixed = match (self, other) {
            (Self::Ctrnn(a), Self::Ctrnn(b)) => a.time_interval() == b.time_interval(),
            (Self::Rbf(a), Self::Rbf(b)) => {
                a.distance_function() == b.distance_function() && a.basis_function() == b.basis_function()
            }
            _ => true,
        };
        self.kind() == other.kind() && fixed && self.block_shapes() == other.block_shapes()
    }

    /// Shape of every parameter and state block, in storage order
    pub(crate) fn block_shapes(&self) -> Vec<&[usize]> {
        match self {
            Self::Static(l) => l.block_shapes(),
            Self::Dynamic(l) => l.block_shapes(),
            Self::Ctrnn(l) => l.block_shapes(),
            Self::Rbf(l) => l.block_shapes(),
        }
    }

    /// Check that the blocks of a decoded layer agree with each other
    pub fn check_consistent(&self) -> Result<()> {
        match self {
            Self::Static(l) => l.check_consistent(),
            Self::Dynamic(l) => l.check_consistent(),
            Self::Ctrnn(l) => l.check_consistent(),
            Self::Rbf(l) => l.check_consistent(),
        }
    }

    pub fn as_static_mut(&mut self) -> Option<&mut StaticLayer> {
        match self {
            Self::Static(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dynamic_mut(&mut self) -> Option<&mut DynamicLayer> {
        match self {
            Self::Dynamic(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_ctrnn_mut(&mut self) -> Option<&mut CtrnnLayer> {
        match self {
            Self::Ctrnn(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_rbf_mut(&mut self) -> Option<&mut RbfLayer> {
        match self {
            Self::Rbf(l) => Some(l),
            _ => None,
        }
    }
}
