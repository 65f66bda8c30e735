//! Layer family for graph-wired controller networks.
//!
//! Implements:
//! - Static affine layers
//! - Time delay lines and recurrent taps
//! - Dynamic layers composing both
//! - CTRNN layers with Euler integration
//! - Radial basis function layers

pub mod activation;
mod arrays;
mod ctrnn;
mod delay;
mod dynamic;
mod layer;
pub mod rbf;
mod recurrence;
mod static_layer;

pub use activation::{Activation, ActivationFunction, ActivationKind};
pub use ctrnn::CtrnnLayer;
pub use delay::TimeDelay;
pub use dynamic::DynamicLayer;
pub use layer::{Layer, LayerKind};
pub use rbf::{Basis, BasisFunction, Distance, DistanceFunction, RbfLayer};
pub use recurrence::TimeRecurrence;
pub use static_layer::StaticLayer;
