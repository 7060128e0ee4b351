//! Lossless JSON encoding for vectors and sparse matrices handed to an
//! artifact sink.
//!
//! Floats are written with shortest round-trip formatting and parsed with
//! `serde_json`'s `float_roundtrip` feature, so `decode(encode(x)) == x`
//! bit for bit. Non-finite values cannot be represented and are rejected.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{LinalgError, LinalgResult};
use crate::sparse::CsrMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrayArtifact {
    Vector {
        values: Vec<f64>,
    },
    Csr {
        nrows: usize,
        ncols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    },
}

impl ArrayArtifact {
    pub fn from_vector(values: &Array1<f64>) -> Self {
        Self::Vector {
            values: values.to_vec(),
        }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self::Vector {
            values: values.to_vec(),
        }
    }

    pub fn from_csr(matrix: &CsrMatrix) -> Self {
        Self::Csr {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            indptr: matrix.indptr().to_vec(),
            indices: matrix.indices().to_vec(),
            data: matrix.data().to_vec(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Vector { .. } => "vector",
            Self::Csr { .. } => "csr",
        }
    }

    pub fn to_bytes(&self) -> LinalgResult<Vec<u8>> {
        let values = match self {
            Self::Vector { values } => values,
            Self::Csr { data, .. } => data,
        };
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(LinalgError::NonFinite {
                what: "artifact",
                index,
            });
        }
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> LinalgResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn into_vector(self) -> LinalgResult<Array1<f64>> {
        match self {
            Self::Vector { values } => Ok(Array1::from(values)),
            other => Err(LinalgError::ArtifactKind {
                expected: "vector",
                found: other.kind(),
            }),
        }
    }

    /// Rebuild a matrix, re-validating the CSR structure.
    pub fn into_csr(self) -> LinalgResult<CsrMatrix> {
        match self {
            Self::Csr {
                nrows,
                ncols,
                indptr,
                indices,
                data,
            } => CsrMatrix::from_parts(nrows, ncols, indptr, indices, data),
            other => Err(LinalgError::ArtifactKind {
                expected: "csr",
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::laplacian_2d;
    use ndarray::array;

    #[test]
    fn awkward_floats_survive_exactly() {
        let values = array![0.1 + 0.2, 1.0 / 3.0, -2.5e-308, 1.7976931348623157e308, 5e-324];
        let bytes = ArrayArtifact::from_vector(&values).to_bytes().unwrap();
        let decoded = ArrayArtifact::from_bytes(&bytes)
            .unwrap()
            .into_vector()
            .unwrap();
        for (a, b) in values.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn csr_round_trip() {
        let m = laplacian_2d(3).unwrap();
        let bytes = ArrayArtifact::from_csr(&m).to_bytes().unwrap();
        let decoded = ArrayArtifact::from_bytes(&bytes).unwrap().into_csr().unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn non_finite_rejected() {
        let err = ArrayArtifact::from_slice(&[1.0, f64::NAN])
            .to_bytes()
            .unwrap_err();
        assert!(matches!(err, LinalgError::NonFinite { index: 1, .. }));
    }

    #[test]
    fn kind_mismatch_reported() {
        let err = ArrayArtifact::from_slice(&[1.0]).into_csr().unwrap_err();
        assert!(matches!(
            err,
            LinalgError::ArtifactKind {
                expected: "csr",
                found: "vector"
            }
        ));
    }

    #[test]
    fn corrupt_structure_rejected_on_decode() {
        let json = br#"{"kind":"csr","nrows":2,"ncols":2,"indptr":[0,1],"indices":[0],"data":[1.0]}"#;
        let err = ArrayArtifact::from_bytes(json).unwrap().into_csr().unwrap_err();
        assert!(matches!(err, LinalgError::InvalidStructure(_)));
    }
}
