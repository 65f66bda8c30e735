//! Array helpers shared by the layer family: serde encoding, shape checks,
//! random initialisation and flat parameter (de)serialization.

use crate::error::{NetworkError, OverlongParameterWarning, Result};
use ndarray::{Array1, Array2};
use rand::Rng;

/// Serde encoding of a matrix as `{ shape, data }` in row-major order
pub(crate) mod matrix {
    use ndarray::Array2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct MatrixData {
        shape: [usize; 2],
        data: Vec<f64>,
    }

    pub fn serialize<S>(matrix: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (rows, cols) = matrix.dim();
        MatrixData {
            shape: [rows, cols],
            data: matrix.iter().copied().collect(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Array2<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = MatrixData::deserialize(deserializer)?;
        Array2::from_shape_vec((data.shape[0], data.shape[1]), data.data)
            .map_err(serde::de::Error::custom)
    }
}

/// Serde encoding of a vector as a plain sequence
pub(crate) mod vector {
    use ndarray::Array1;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(vector: &Array1<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        vector.iter().copied().collect::<Vec<f64>>().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Array1<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Array1::from_vec(Vec::<f64>::deserialize(deserializer)?))
    }
}

/// Uniform `[0, 1)` matrix
pub(crate) fn random_matrix<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>())
}

/// Uniform `[0, 1)` vector
pub(crate) fn random_vector<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Array1<f64> {
    Array1::from_shape_fn(len, |_| rng.gen::<f64>())
}

pub(crate) fn check_vector(context: &str, expected: usize, vector: &Array1<f64>) -> Result<()> {
    if vector.len() != expected {
        return Err(NetworkError::dimension(context, [expected], [vector.len()]));
    }
    Ok(())
}

pub(crate) fn check_matrix(context: &str, expected: (usize, usize), matrix: &Array2<f64>) -> Result<()> {
    if matrix.dim() != expected {
        let (rows, cols) = matrix.dim();
        return Err(NetworkError::dimension(
            context,
            [expected.0, expected.1],
            [rows, cols],
        ));
    }
    Ok(())
}

/// Cursor over a flat parameter vector.
///
/// Construction fails when the vector is shorter than `expected`, so the
/// `take_*` calls afterwards cannot run out of values.
pub(crate) struct ParameterReader<'a> {
    layer: &'a str,
    params: &'a [f64],
    expected: usize,
    cursor: usize,
}

impl<'a> ParameterReader<'a> {
    pub fn new(layer: &'a str, params: &'a [f64], expected: usize) -> Result<Self> {
        if params.len() < expected {
            return Err(NetworkError::dimension(
                format!("{} parameter vector", layer),
                [expected],
                [params.len()],
            ));
        }
        Ok(Self {
            layer,
            params,
            expected,
            cursor: 0,
        })
    }

    fn take(&mut self, len: usize) -> &'a [f64] {
        let slice = &self.params[self.cursor..self.cursor + len];
        self.cursor += len;
        slice
    }

    pub fn vector(&mut self, len: usize) -> Array1<f64> {
        Array1::from_vec(self.take(len).to_vec())
    }

    pub fn matrix(&mut self, rows: usize, cols: usize) -> Array2<f64> {
        let data = self.take(rows * cols);
        Array2::from_shape_fn((rows, cols), |(r, c)| data[r * cols + c])
    }

    pub fn pair(&mut self) -> (f64, f64) {
        let pair = self.take(2);
        (pair[0], pair[1])
    }

    /// Report leftover values once every block has been read
    pub fn finish(self) -> Option<OverlongParameterWarning> {
        debug_assert_eq!(self.cursor, self.expected);
        OverlongParameterWarning::check(self.layer, self.expected, self.params.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_reader_rejects_short_vector() {
        let params = [1.0, 2.0];
        let err = ParameterReader::new("l", &params, 3).err().unwrap();
        assert!(matches!(err, NetworkError::Dimension { .. }));
    }

    #[test]
    fn test_reader_blocks_in_order() {
        let params = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut reader = ParameterReader::new("l", &params, 8).unwrap();
        assert_eq!(reader.matrix(2, 2), array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(reader.vector(2), array![5.0, 6.0]);
        assert_eq!(reader.pair(), (7.0, 8.0));
        assert!(reader.finish().is_none());
    }

    #[test]
    fn test_reader_warns_on_surplus() {
        let params = [0.0; 5];
        let mut reader = ParameterReader::new("l", &params, 2).unwrap();
        reader.pair();
        assert_eq!(reader.finish().unwrap().ignored(), 3);
    }

    #[test]
    fn test_random_init_in_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let m = random_matrix(&mut rng, 4, 5);
        assert!(m.iter().all(|&w| (0.0..1.0).contains(&w)));
    }

    #[test]
    fn test_matrix_serde_shape() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Holder {
            #[serde(with = "matrix")]
            m: Array2<f64>,
        }

        let holder = Holder {
            m: array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
        };
        let bytes = bincode::serialize(&holder).unwrap();
        let back: Holder = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.m, holder.m);
    }
}
