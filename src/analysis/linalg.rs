//! Symmetric positive-definite systems on ndarray-linalg's Cholesky routines

use crate::errors::{Result, SynthError};
use ndarray::{Array1, Array2};
use ndarray_linalg::{Cholesky, InverseC, SolveC, UPLO};

/// Relative pivot threshold below which a matrix is treated as singular
const PIVOT_TOLERANCE: f64 = 1e-10;

/// A numerically positive-definite matrix, checked on construction
#[derive(Debug, Clone)]
pub struct SpdSystem {
    a: Array2<f64>,
}

impl SpdSystem {
    /// `None` when `a` is not square, not finite, or has a Cholesky pivot
    /// below the relative tolerance (rank deficient for this purpose)
    pub fn new(a: Array2<f64>) -> Option<Self> {
        if !a.is_square() || a.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let scale = a.diag().iter().fold(1.0_f64, |m, v| m.max(v.abs()));
        let factor = a.cholesky(UPLO::Lower).ok()?;
        let well_conditioned = factor
            .diag()
            .iter()
            .all(|d| d.is_finite() && d * d > PIVOT_TOLERANCE * scale);
        well_conditioned.then_some(Self { a })
    }

    pub fn dim(&self) -> usize {
        self.a.nrows()
    }

    /// Solve `A x = b`
    pub fn solve(&self, b: &Array1<f64>) -> Result<Array1<f64>> {
        self.a
            .solvec(b)
            .map_err(|e| SynthError::ModelFit(format!("Cholesky solve failed: {}", e)))
    }

    /// Full inverse of `A`
    pub fn inverse(&self) -> Result<Array2<f64>> {
        self.a
            .invc()
            .map_err(|e| SynthError::ModelFit(format!("Cholesky inverse failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_spd_system() {
        let system = SpdSystem::new(array![[4.0, 2.0], [2.0, 3.0]]).unwrap();
        let x = system.solve(&array![6.0, 5.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
        assert_eq!(system.dim(), 2);
    }

    #[test]
    fn test_inverse() {
        let inv = SpdSystem::new(array![[2.0, 0.0], [0.0, 0.5]])
            .unwrap()
            .inverse()
            .unwrap();
        assert!((inv[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((inv[[1, 1]] - 2.0).abs() < 1e-12);
        assert!(inv[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn test_singular_rejected() {
        assert!(SpdSystem::new(array![[1.0, 1.0], [1.0, 1.0]]).is_none());
        // positive pivots that collapse relative to the diagonal
        assert!(SpdSystem::new(array![[1.0, 1.0], [1.0, 1.0 + 1e-14]]).is_none());
        assert!(SpdSystem::new(array![[1.0, f64::NAN], [0.0, 1.0]]).is_none());
    }
}
