//! Error norms against a reference solution, for validating a finished run.

use crate::error::{Error, Result};
use crate::linalg::{NormType, Vector};
use crate::traits::ExactSolution;

/// ‖y − y_exact‖ in the requested norm.
pub fn error(y: &Vector, y_exact: &Vector, kind: NormType) -> Result<f64> {
    Error::check_len("compare::error", y.len(), y_exact.len())?;
    let mut diff = y.duplicate();
    diff.waxpy(-1.0, y_exact, y)?;
    diff.norm(kind)
}

/// Evaluates `exact` at `t` and compares it against `y`.
pub fn error_against_exact(
    y: &Vector,
    exact: &impl ExactSolution,
    t: f64,
    kind: NormType,
) -> Result<f64> {
    let y_exact = exact_vector(exact, t, y.len())?;
    error(y, &y_exact, kind)
}

/// Assembled vector holding the exact solution at `t`.
pub fn exact_vector(exact: &impl ExactSolution, t: f64, len: usize) -> Result<Vector> {
    let mut v = Vector::new(len)?;
    v.set(0.0)?;
    exact.evaluate(t, &mut v.write()?);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinity_and_two_norm_errors() {
        let y = Vector::from_slice(&[1.0, 2.0, 3.0]).unwrap();
        let reference = Vector::from_slice(&[1.0, 2.5, 1.0]).unwrap();
        assert_eq!(error(&y, &reference, NormType::Infinity).unwrap(), 2.0);
        assert_eq!(error(&y, &reference, NormType::One).unwrap(), 2.5);
        assert!((error(&y, &reference, NormType::Two).unwrap() - 4.25_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn inputs_are_not_modified() {
        let y = Vector::from_slice(&[1.0, 2.0]).unwrap();
        let reference = Vector::from_slice(&[0.0, 0.0]).unwrap();
        error(&y, &reference, NormType::Two).unwrap();
        assert_eq!(y.to_vec().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let y = Vector::from_slice(&[1.0, 2.0]).unwrap();
        let reference = Vector::from_slice(&[1.0]).unwrap();
        assert!(matches!(
            error(&y, &reference, NormType::Infinity),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn compares_against_closure_solution() {
        let exact = |t: f64, out: &mut [f64]| {
            out[0] = t;
            out[1] = 2.0 * t;
        };
        let y = Vector::from_slice(&[1.0, 2.1]).unwrap();
        let err = error_against_exact(&y, &exact, 1.0, NormType::Infinity).unwrap();
        assert!((err - 0.1).abs() < 1e-12);
    }
}
