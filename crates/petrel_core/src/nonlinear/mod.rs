//! Newton-Raphson solver for square nonlinear systems.
//!
//! Each iteration evaluates F(x), checks the stopping tests, builds the
//! Jacobian (analytic when the system supplies one, finite differences
//! otherwise), solves J·Δx = −F, and backtracks along Δx while the residual
//! norm would grow. A direction along which no backtrack lowers the residual
//! ends the solve as diverged, leaving x at the last accepted iterate.

mod jacobian;
mod newton;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use jacobian::FiniteDifferenceJacobian;
pub use newton::NewtonSolver;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    /// Stop when ‖F(x)‖ falls below this value.
    pub abs_tol: f64,
    /// Stop when ‖F(x)‖ < rel_tol·‖F(x₀)‖.
    pub rel_tol: f64,
    /// Stop when the applied step is small relative to ‖x‖.
    pub step_tol: f64,
    pub max_iterations: usize,
    pub line_search_max_backtracks: usize,
    /// A line search whose best trial still exceeds this multiple of
    /// ‖F(x₀)‖ reports `ResidualGrowth` instead of `LineSearchFailed`.
    pub divergence_tolerance: f64,
    /// Rebuild the Jacobian every `jacobian_lag` iterations; 1 is full Newton.
    pub jacobian_lag: usize,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            abs_tol: 1e-50,
            rel_tol: 1e-8,
            step_tol: 1e-8,
            max_iterations: 50,
            line_search_max_backtracks: 10,
            divergence_tolerance: 1e4,
            jacobian_lag: 1,
        }
    }
}

impl NewtonSettings {
    pub fn validate(&self) -> Result<()> {
        if self.abs_tol.is_nan() || self.abs_tol < 0.0 {
            return Err(Error::config("abs_tol must be non-negative."));
        }
        if self.rel_tol.is_nan() || self.rel_tol < 0.0 {
            return Err(Error::config("rel_tol must be non-negative."));
        }
        if self.step_tol.is_nan() || self.step_tol < 0.0 {
            return Err(Error::config("step_tol must be non-negative."));
        }
        if self.max_iterations == 0 {
            return Err(Error::config("max_iterations must be greater than zero."));
        }
        if self.divergence_tolerance.is_nan() || self.divergence_tolerance <= 1.0 {
            return Err(Error::config("divergence_tolerance must be greater than one."));
        }
        if self.jacobian_lag == 0 {
            return Err(Error::config("jacobian_lag must be at least one."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceCriterion {
    AbsoluteResidual,
    RelativeResidual,
    StepSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceReason {
    NonFiniteResidual,
    NonFiniteJacobian,
    SingularJacobian,
    ResidualGrowth,
    /// No backtracked step lowered ‖F‖.
    LineSearchFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewtonStatus {
    Converged(ConvergenceCriterion),
    Diverged(DivergenceReason),
    MaxIterationsExceeded,
}

/// Outcome of one Newton solve. The iterate itself is left in the caller's
/// vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewtonReport {
    pub status: NewtonStatus,
    pub iterations: usize,
    pub residual_norm: f64,
    pub initial_residual_norm: f64,
    /// ‖F‖ after every iteration, starting with ‖F(x₀)‖.
    pub residual_history: Vec<f64>,
    pub function_evaluations: usize,
    pub jacobian_evaluations: usize,
}

impl NewtonReport {
    pub fn converged(&self) -> bool {
        matches!(self.status, NewtonStatus::Converged(_))
    }

    /// Maps a failed outcome onto the crate error taxonomy.
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            NewtonStatus::Converged(_) => Ok(self),
            NewtonStatus::Diverged(reason) => Err(Error::Diverged {
                iterations: self.iterations,
                reason: format!("{reason:?} (‖F(x)‖ = {})", self.residual_norm),
            }),
            NewtonStatus::MaxIterationsExceeded => Err(Error::MaxIterationsExceeded {
                iterations: self.iterations,
                residual_norm: self.residual_norm,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        NewtonSettings::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut settings = NewtonSettings::default();
        settings.max_iterations = 0;
        assert!(matches!(settings.validate(), Err(Error::Configuration(_))));

        let mut settings = NewtonSettings::default();
        settings.rel_tol = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = NewtonSettings::default();
        settings.jacobian_lag = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn into_result_maps_failures() {
        let report = NewtonReport {
            status: NewtonStatus::MaxIterationsExceeded,
            iterations: 3,
            residual_norm: 0.5,
            initial_residual_norm: 1.0,
            residual_history: vec![1.0, 0.5],
            function_evaluations: 4,
            jacobian_evaluations: 3,
        };
        assert!(matches!(
            report.clone().into_result(),
            Err(Error::MaxIterationsExceeded { iterations: 3, .. })
        ));

        let diverged = NewtonReport {
            status: NewtonStatus::Diverged(DivergenceReason::SingularJacobian),
            ..report
        };
        let message = diverged.into_result().unwrap_err().to_string();
        assert!(message.contains("SingularJacobian"), "{message}");
    }
}
