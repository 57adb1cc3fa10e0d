//! The four reference programs, as library functions the binaries wrap.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use petrel_core::compare;
use petrel_core::dump::write_vector;
use petrel_core::linalg::{InsertMode, Matrix, NormType, Vector};
use petrel_core::nonlinear::{NewtonReport, NewtonSolver};
use petrel_core::ode::RungeKutta;
use petrel_core::options::Options;

use crate::problems::{ExpCircle, ForcedOscillator};

pub const RHS_VALUES: [f64; 4] = [7.0, 1.0, 2.0, 4.0];

pub const SYSTEM_ROWS: [[f64; 4]; 4] = [
    [1.0, 0.0, 4.0, 2.0],
    [2.0, 6.0, 1.0, 5.0],
    [0.0, 1.0, -1.0, -2.0],
    [4.0, 3.0, -2.0, 1.0],
];

/// Parameter of the exponential curve in both nonlinear programs.
pub const EXP_CIRCLE_B: f64 = 2.0;

/// Builds the reference vector and matrix, then dumps the vector to `path`.
pub fn declare_and_dump(path: impl AsRef<Path>) -> Result<(Vector, Matrix)> {
    let path = path.as_ref();
    let columns = [0, 1, 2, 3];

    let mut b = Vector::new(RHS_VALUES.len())?;
    b.set_values(&columns, &RHS_VALUES, InsertMode::Insert)?;
    b.assemble()?;

    let mut a = Matrix::new(SYSTEM_ROWS.len(), columns.len())?;
    for (i, row) in SYSTEM_ROWS.iter().enumerate() {
        a.set_values(&[i], &columns, row, InsertMode::Insert)
            .with_context(|| format!("inserting matrix row {i}"))?;
    }
    a.assemble()?;
    log::debug!("assembled {}x{} matrix with {} nonzeros", a.nrows(), a.ncols(), a.nnz()?);

    write_vector(path, &b).with_context(|| format!("dumping vector to {}", path.display()))?;
    Ok((b, a))
}

/// Solves the exp/circle intersection from x = (1, 1).
pub fn solve_exp_circle(options: &Options, analytic_jacobian: bool) -> Result<(Vector, NewtonReport)> {
    let mut system = if analytic_jacobian {
        ExpCircle::with_analytic_jacobian(EXP_CIRCLE_B)
    } else {
        ExpCircle::new(EXP_CIRCLE_B)
    };
    let mut solver = NewtonSolver::new(2, options.newton_settings())?;
    let mut x = Vector::new(2)?;
    x.set(1.0)?;

    let report = solver
        .solve(&mut system, &mut x)?
        .into_result()
        .context("Newton solve did not converge")?;
    log::info!(
        "converged in {} iterations, residual {:e}",
        report.iterations,
        report.residual_norm
    );
    Ok((x, report))
}

/// Result line of the ODE program.
#[derive(Debug, Clone, Copy)]
pub struct OdeSummary {
    pub final_time: f64,
    pub steps: usize,
    pub error: f64,
}

impl fmt::Display for OdeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "finaltime: {:.4}\t n_steps: {}, error: {:e}",
            self.final_time, self.steps, self.error
        )
    }
}

/// Options for the ODE program: the library defaults with tf = 10.
pub fn ode_defaults() -> Options {
    Options {
        final_time: 10.0,
        ..Options::default()
    }
}

/// Integrates the forced oscillator from t = 0 and compares with the exact solution.
pub fn integrate_oscillator(options: &Options) -> Result<OdeSummary> {
    let t0 = 0.0;
    let mut integrator = RungeKutta::new(2, options.integrator_settings())?;
    let mut y = compare::exact_vector(&ForcedOscillator::exact, t0, 2)?;

    let report = integrator
        .integrate(&mut ForcedOscillator, &mut y, t0, options.final_time)?
        .into_result()
        .context("time integration failed")?;
    let error =
        compare::error_against_exact(&y, &ForcedOscillator::exact, report.t, NormType::Infinity)?;

    Ok(OdeSummary {
        final_time: report.t,
        steps: report.steps,
        error,
    })
}
