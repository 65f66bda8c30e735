//! Radial basis function layer: `basis(distance(x, centers), parameter)`.
//!
//! The distance and basis are pluggable pure functions; [`Distance`] and
//! [`Basis`] are the stock implementations used by networks built from
//! configuration.

use super::arrays::{self, ParameterReader};
use crate::error::{NetworkError, OverlongParameterWarning, Result};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// `vector(in), centers(out × in) -> distances(out)`
pub trait DistanceFunction {
    fn distance(&self, input: &Array1<f64>, centers: &Array2<f64>) -> Array1<f64>;
}

/// `distances(out), parameter -> outputs(out)`
pub trait BasisFunction {
    fn basis(&self, distances: &Array1<f64>, parameter: f64) -> Array1<f64>;

    /// Whether `parameter` keeps the function finite everywhere
    fn accepts(&self, parameter: f64) -> bool {
        parameter.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl DistanceFunction for Distance {
    fn distance(&self, input: &Array1<f64>, centers: &Array2<f64>) -> Array1<f64> {
        let diff = centers - input;
        match self {
            Self::Euclidean => diff.mapv(|d| d * d).sum_axis(Axis(1)).mapv(f64::sqrt),
            Self::Manhattan => diff.mapv(f64::abs).sum_axis(Axis(1)),
            Self::Chebyshev => diff
                .map_axis(Axis(1), |row| row.iter().fold(0.0f64, |m, d| m.max(d.abs()))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// `exp(-p·r²)`
    #[default]
    Gaussian,
    /// `sqrt(r² + p²)`
    Multiquadric,
    /// `1 / sqrt(r² + p²)`
    InverseMultiquadric,
    /// `1 / (1 + (p·r)²)`
    InverseQuadratic,
}

impl BasisFunction for Basis {
    fn basis(&self, distances: &Array1<f64>, p: f64) -> Array1<f64> {
        match self {
            Self::Gaussian => distances.mapv(|r| (-p * r * r).exp()),
            Self::Multiquadric => distances.mapv(|r| (r * r + p * p).sqrt()),
            Self::InverseMultiquadric => distances.mapv(|r| 1.0 / (r * r + p * p).sqrt()),
            Self::InverseQuadratic => distances.mapv(|r| 1.0 / (1.0 + (p * r) * (p * r))),
        }
    }

    fn accepts(&self, p: f64) -> bool {
        match self {
            // a zero parameter divides by zero at the center
            Self::InverseMultiquadric => p.is_finite() && p != 0.0,
            // a negative gain grows without bound
            Self::Gaussian => p.is_finite() && p > 0.0,
            _ => p.is_finite(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RbfLayer<D = Distance, B = Basis> {
    name: String,
    /// One center per output neuron (out × in)
    #[serde(with = "arrays::matrix")]
    centers: Array2<f64>,
    distance: D,
    basis: B,
    parameter: f64,
}

impl<D: DistanceFunction, B: BasisFunction> RbfLayer<D, B> {
    /// Centers start uniform in `[0, 1)`.
    ///
    /// Fails fast when `parameter` would make the basis degenerate.
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        input_dim: usize,
        output_dim: usize,
        distance: D,
        basis: B,
        parameter: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let name = name.into();
        if !basis.accepts(parameter) {
            return Err(NetworkError::configuration(format!(
                "{}: basis parameter {} is degenerate",
                name, parameter
            )));
        }
        Ok(Self {
            name,
            centers: arrays::random_matrix(rng, output_dim, input_dim),
            distance,
            basis,
            parameter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_dim(&self) -> usize {
        self.centers.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.centers.nrows()
    }

    pub fn forward(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        arrays::check_vector(&format!("{} input", self.name), self.input_dim(), input)?;
        let distances = self.distance.distance(input, &self.centers);
        Ok(self.basis.basis(&distances, self.parameter))
    }

    pub fn parameter_count(&self) -> usize {
        self.centers.len()
    }

    /// Load the center matrix, row-major
    pub fn update_parameters(&mut self, params: &[f64]) -> Result<Option<OverlongParameterWarning>> {
        let (rows, cols) = self.centers.dim();
        let mut reader = ParameterReader::new(&self.name, params, self.parameter_count())?;
        let centers = reader.matrix(rows, cols);
        let warning = reader.finish();

        self.centers = centers;
        Ok(warning)
    }

    pub fn return_parameters(&self) -> Vec<f64> {
        self.centers.iter().copied().collect()
    }

    pub fn centers(&self) -> &Array2<f64> {
        &self.centers
    }

    pub fn set_centers(&mut self, centers: Array2<f64>) -> Result<()> {
        arrays::check_matrix(&format!("{} centers", self.name), self.centers.dim(), &centers)?;
        self.centers = centers;
        Ok(())
    }

    pub fn basis_parameter(&self) -> f64 {
        self.parameter
    }

    pub fn distance_function(&self) -> &D {
        &self.distance
    }

    pub fn basis_function(&self) -> &B {
        &self.basis
    }

    pub(crate) fn block_shapes(&self) -> Vec<&[usize]> {
        vec![self.centers.shape()]
    }

    pub(crate) fn check_consistent(&self) -> Result<()> {
        if !self.basis.accepts(self.parameter) {
            return Err(NetworkError::configuration(format!(
                "{}: basis parameter {} is degenerate",
                self.name, self.parameter
            )));
        }
        Ok(())
    }
}
