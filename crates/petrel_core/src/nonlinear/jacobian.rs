use crate::error::{Error, Result};
use crate::linalg::{InsertMode, Matrix};
use crate::traits::NonlinearSystem;

/// Forward-difference Jacobian, built one column at a time.
///
/// Column j uses the step h = √ε · max(|xⱼ|, 100·√ε), signed like xⱼ.
#[derive(Debug, Clone)]
pub struct FiniteDifferenceJacobian {
    perturbed: Vec<f64>,
    f_perturbed: Vec<f64>,
    column: Vec<f64>,
    rows: Vec<usize>,
}

impl FiniteDifferenceJacobian {
    pub fn new(dim: usize) -> Self {
        Self {
            perturbed: vec![0.0; dim],
            f_perturbed: vec![0.0; dim],
            column: vec![0.0; dim],
            rows: (0..dim).collect(),
        }
    }

    /// Fills and assembles `jac` from residual differences around `x`, where
    /// `f` already holds F(x). Returns the number of residual evaluations.
    pub fn compute(
        &mut self,
        system: &mut impl NonlinearSystem,
        x: &[f64],
        f: &[f64],
        jac: &mut Matrix,
    ) -> Result<usize> {
        let dim = self.rows.len();
        Error::check_len("FiniteDifferenceJacobian::compute", dim, x.len())?;
        Error::check_len("FiniteDifferenceJacobian::compute", dim, f.len())?;

        let epsilon = f64::EPSILON.sqrt();
        let umin = 100.0 * epsilon;

        for j in 0..dim {
            self.perturbed.copy_from_slice(x);
            let mut dx = x[j];
            if dx >= 0.0 && dx < umin {
                dx = umin;
            } else if dx < 0.0 && dx > -umin {
                dx = -umin;
            }
            dx *= epsilon;
            self.perturbed[j] = x[j] + dx;
            // Use the representable step so roundoff in x + dx cancels.
            let h = self.perturbed[j] - x[j];

            system.residual(&self.perturbed, &mut self.f_perturbed)?;
            for i in 0..dim {
                self.column[i] = (self.f_perturbed[i] - f[i]) / h;
            }
            jac.set_values(&self.rows, &[j], &self.column, InsertMode::Insert)?;
        }
        jac.assemble()?;
        Ok(dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FnSystem;
    use approx::assert_relative_eq;

    #[test]
    fn matches_analytic_derivatives() {
        let mut system = FnSystem::new(2, |x: &[f64], out: &mut [f64]| {
            out[0] = x[0] * x[0] * x[1];
            out[1] = x[0].sin() + 3.0 * x[1];
            Ok(())
        });
        let x = [1.5, -0.5];
        let mut f = [0.0; 2];
        system.residual(&x, &mut f).unwrap();

        let mut jac = Matrix::new(2, 2).unwrap();
        let mut fd = FiniteDifferenceJacobian::new(2);
        let evaluations = fd.compute(&mut system, &x, &f, &mut jac).unwrap();
        assert_eq!(evaluations, 2);

        assert_relative_eq!(jac.get_value(0, 0).unwrap(), 2.0 * 1.5 * -0.5, epsilon = 1e-6);
        assert_relative_eq!(jac.get_value(0, 1).unwrap(), 1.5 * 1.5, epsilon = 1e-6);
        assert_relative_eq!(jac.get_value(1, 0).unwrap(), 1.5_f64.cos(), epsilon = 1e-6);
        assert_relative_eq!(jac.get_value(1, 1).unwrap(), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_component_uses_minimum_step() {
        let mut system = FnSystem::new(1, |x: &[f64], out: &mut [f64]| {
            out[0] = 4.0 * x[0];
            Ok(())
        });
        let mut jac = Matrix::new(1, 1).unwrap();
        let mut fd = FiniteDifferenceJacobian::new(1);
        fd.compute(&mut system, &[0.0], &[0.0], &mut jac).unwrap();
        assert_relative_eq!(jac.get_value(0, 0).unwrap(), 4.0, epsilon = 1e-6);
    }
}
