//! Problem definitions shared by the reference programs.

use petrel_core::linalg::{InsertMode, Matrix};
use petrel_core::traits::{NonlinearSystem, OdeSystem};
use petrel_core::Result;

/// Intersection of y = e^{b·x}/b with the unit circle:
///
/// F₀ = e^{b·x₀}/b − x₁
/// F₁ = x₀² + x₁² − 1
#[derive(Debug, Clone, Copy)]
pub struct ExpCircle {
    pub b: f64,
    /// Report the analytic Jacobian to the solver; otherwise it differences F.
    pub analytic_jacobian: bool,
}

impl ExpCircle {
    pub fn new(b: f64) -> Self {
        Self {
            b,
            analytic_jacobian: false,
        }
    }

    pub fn with_analytic_jacobian(b: f64) -> Self {
        Self {
            b,
            analytic_jacobian: true,
        }
    }
}

impl NonlinearSystem for ExpCircle {
    fn dimension(&self) -> usize {
        2
    }

    fn residual(&mut self, x: &[f64], out: &mut [f64]) -> Result<()> {
        out[0] = (1.0 / self.b) * (self.b * x[0]).exp() - x[1];
        out[1] = x[0] * x[0] + x[1] * x[1] - 1.0;
        Ok(())
    }

    fn has_jacobian(&self) -> bool {
        self.analytic_jacobian
    }

    fn jacobian(&mut self, x: &[f64], jac: &mut Matrix) -> Result<()> {
        let values = [(self.b * x[0]).exp(), -1.0, 2.0 * x[0], 2.0 * x[1]];
        jac.set_values(&[0, 1], &[0, 1], &values, InsertMode::Insert)?;
        jac.assemble()
    }
}

/// Undamped oscillator driven by a linear ramp: y₀' = y₁, y₁' = −y₀ + t.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedOscillator;

impl ForcedOscillator {
    /// y₀ = t − sin t, y₁ = 1 − cos t; also the initial condition at t = 0.
    pub fn exact(t: f64, out: &mut [f64]) {
        out[0] = t - t.sin();
        out[1] = 1.0 - t.cos();
    }
}

impl OdeSystem for ForcedOscillator {
    fn dimension(&self) -> usize {
        2
    }

    fn rhs(&mut self, t: f64, y: &[f64], out: &mut [f64]) -> Result<()> {
        out[0] = y[1];
        out[1] = -y[0] + t;
        Ok(())
    }
}
