//! Solver options shared by the Newton solver and the integrator.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nonlinear::NewtonSettings;
use crate::ode::{ExactFinalTime, IntegratorSettings, RkMethod};

/// Every option the engine recognizes, with its default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub step_tol: f64,
    pub max_iterations: usize,
    pub line_search_max_backtracks: usize,
    pub divergence_tolerance: f64,
    pub jacobian_lag: usize,
    pub rk_method: RkMethod,
    pub dt: f64,
    pub final_time: f64,
    pub max_steps: usize,
    pub exact_final_time: ExactFinalTime,
}

impl Default for Options {
    fn default() -> Self {
        let newton = NewtonSettings::default();
        let ode = IntegratorSettings::default();
        Self {
            abs_tol: newton.abs_tol,
            rel_tol: newton.rel_tol,
            step_tol: newton.step_tol,
            max_iterations: newton.max_iterations,
            line_search_max_backtracks: newton.line_search_max_backtracks,
            divergence_tolerance: newton.divergence_tolerance,
            jacobian_lag: newton.jacobian_lag,
            rk_method: ode.method,
            dt: ode.dt,
            final_time: 1.0,
            max_steps: ode.max_steps,
            exact_final_time: ode.exact_final_time,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        self.newton_settings().validate()?;
        self.integrator_settings().validate()?;
        if !self.final_time.is_finite() {
            return Err(Error::config("final_time must be finite."));
        }
        Ok(())
    }

    pub fn newton_settings(&self) -> NewtonSettings {
        NewtonSettings {
            abs_tol: self.abs_tol,
            rel_tol: self.rel_tol,
            step_tol: self.step_tol,
            max_iterations: self.max_iterations,
            line_search_max_backtracks: self.line_search_max_backtracks,
            divergence_tolerance: self.divergence_tolerance,
            jacobian_lag: self.jacobian_lag,
        }
    }

    pub fn integrator_settings(&self) -> IntegratorSettings {
        IntegratorSettings {
            method: self.rk_method,
            dt: self.dt,
            max_steps: self.max_steps,
            exact_final_time: self.exact_final_time,
            adaptive: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn defaults_are_valid() {
        let options = Options::default();
        options.validate().unwrap();
        assert_eq!(options.max_iterations, 50);
        assert_eq!(options.rk_method, RkMethod::Rk4);
        assert_eq!(options.exact_final_time, ExactFinalTime::MatchStep);
    }

    #[test]
    fn splits_into_solver_settings() {
        let options = Options {
            abs_tol: 1e-8,
            jacobian_lag: 2,
            rk_method: RkMethod::Rk5dp,
            dt: 0.05,
            ..Options::default()
        };
        let newton = options.newton_settings();
        assert_eq!(newton.abs_tol, 1e-8);
        assert_eq!(newton.jacobian_lag, 2);
        let ode = options.integrator_settings();
        assert_eq!(ode.method, RkMethod::Rk5dp);
        assert_eq!(ode.dt, 0.05);
        assert!(ode.adaptive.is_none());
    }

    #[test]
    fn validate_reports_offending_option() {
        let options = Options {
            dt: -1.0,
            ..Options::default()
        };
        assert_err_contains(options.validate(), "dt must be positive");

        let options = Options {
            max_iterations: 0,
            ..Options::default()
        };
        assert_err_contains(options.validate(), "max_iterations");

        let options = Options {
            final_time: f64::NAN,
            ..Options::default()
        };
        assert_err_contains(options.validate(), "final_time");
    }
}
