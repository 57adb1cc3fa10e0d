use nalgebra::DVector;

use super::{Matrix, Vector};
use crate::error::{Error, Result};

/// Solves A·x = b for an assembled square matrix.
pub trait LinearSolver {
    fn solve(&mut self, a: &Matrix, b: &Vector, x: &mut Vector) -> Result<()>;
}

/// Direct solve through a dense LU factorization with partial pivoting.
///
/// Suited to the small systems produced by the Newton solver; the sparse
/// matrix is densified before factorizing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseLu;

impl LinearSolver for DenseLu {
    fn solve(&mut self, a: &Matrix, b: &Vector, x: &mut Vector) -> Result<()> {
        if a.nrows() != a.ncols() {
            return Err(Error::DimensionMismatch {
                context: "DenseLu::solve (square matrix)",
                expected: a.nrows(),
                actual: a.ncols(),
            });
        }
        Error::check_len("DenseLu::solve", a.nrows(), b.len())?;
        Error::check_len("DenseLu::solve", a.ncols(), x.len())?;

        let dense = a.to_dense()?;
        let rhs = DVector::from_column_slice(&b.read()?);
        let solution = dense.lu().solve(&rhs).ok_or(Error::SingularMatrix)?;
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(Error::SingularMatrix);
        }

        x.set(0.0)?;
        x.write()?.copy_from_slice(solution.as_slice());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solves_small_system() {
        let a = Matrix::from_row_slice(2, 2, &[4.0, 1.0, 2.0, 3.0]).unwrap();
        let b = Vector::from_slice(&[1.0, 2.0]).unwrap();
        let mut x = b.duplicate();
        DenseLu.solve(&a, &b, &mut x).unwrap();
        let x = x.to_vec().unwrap();
        assert_relative_eq!(x[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_is_reported() {
        let a = Matrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]).unwrap();
        let b = Vector::from_slice(&[1.0, 3.0]).unwrap();
        let mut x = b.duplicate();
        assert!(matches!(
            DenseLu.solve(&a, &b, &mut x),
            Err(Error::SingularMatrix)
        ));
    }

    #[test]
    fn rectangular_matrix_is_rejected() {
        let a = Matrix::from_row_slice(1, 2, &[1.0, 1.0]).unwrap();
        let b = Vector::from_slice(&[1.0]).unwrap();
        let mut x = Vector::new(2).unwrap();
        assert!(matches!(
            DenseLu.solve(&a, &b, &mut x),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
