//! Explicit Runge-Kutta time integration.
//!
//! The integrator advances y' = g(t, y) from `t0` to `tf` using a fixed
//! Butcher tableau. Steps are fixed-size unless an adaptive controller is
//! configured, in which case an embedded pair drives step acceptance and
//! rescaling.

mod integrator;
mod tableau;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use integrator::RungeKutta;
pub use tableau::{
    ButcherTableau, RkMethod, BOGACKI_SHAMPINE, CLASSIC_RK4, DORMAND_PRINCE, FORWARD_EULER, HEUN,
    TSITOURAS,
};

/// What to do when the last full step would pass the end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExactFinalTime {
    /// Shrink the last step so integration ends exactly on `tf`.
    #[default]
    MatchStep,
    /// Take the full step and stop past `tf`.
    StepOver,
}

impl FromStr for ExactFinalTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "matchstep" => Ok(Self::MatchStep),
            "stepover" => Ok(Self::StepOver),
            _ => Err(Error::config(format!(
                "exact_final_time must be 'matchstep' or 'stepover', got '{s}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdaptSettings {
    pub rtol: f64,
    pub atol: f64,
    pub safety: f64,
    pub fac_min: f64,
    pub fac_max: f64,
    pub dt_min: f64,
    pub dt_max: f64,
}

impl Default for AdaptSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
            safety: 0.9,
            fac_min: 0.1,
            fac_max: 10.0,
            dt_min: 1e-12,
            dt_max: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntegratorSettings {
    pub method: RkMethod,
    /// Fixed step, or the initial step when adaptive.
    pub dt: f64,
    pub max_steps: usize,
    pub exact_final_time: ExactFinalTime,
    pub adaptive: Option<AdaptSettings>,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            method: RkMethod::Rk4,
            dt: 0.1,
            max_steps: 100_000,
            exact_final_time: ExactFinalTime::MatchStep,
            adaptive: None,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(Error::config("dt must be positive."));
        }
        if self.max_steps == 0 {
            return Err(Error::config("max_steps must be greater than zero."));
        }
        if let Some(adapt) = &self.adaptive {
            if !self.method.tableau().is_embedded() {
                return Err(Error::config(format!(
                    "adaptive stepping requires an embedded method, {} has none",
                    self.method
                )));
            }
            if adapt.rtol.is_nan() || adapt.atol.is_nan() || adapt.rtol < 0.0 || adapt.atol < 0.0 {
                return Err(Error::config("rtol and atol must be non-negative."));
            }
            if adapt.rtol == 0.0 && adapt.atol == 0.0 {
                return Err(Error::config("rtol and atol cannot both be zero."));
            }
            if !(adapt.safety > 0.0 && adapt.safety <= 1.0) {
                return Err(Error::config("safety must lie in (0, 1]."));
            }
            if !(adapt.fac_min > 0.0 && adapt.fac_min < 1.0 && adapt.fac_max > 1.0) {
                return Err(Error::config("fac_min must lie in (0, 1) and fac_max above 1."));
            }
            if adapt.dt_min.is_nan() || adapt.dt_min < 0.0 || adapt.dt_max <= adapt.dt_min {
                return Err(Error::config("dt_min must be non-negative and below dt_max."));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationStatus {
    Completed,
    /// The RHS produced NaN or Inf; the state is the last valid one.
    NumericalFailure,
    StepSizeTooSmall,
    MaxStepsExceeded,
}

/// Outcome of one integration. The final state is left in the caller's
/// vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub status: IntegrationStatus,
    /// Time reached; on failure, the time of the last valid state.
    pub t: f64,
    pub steps: usize,
    pub rejected_steps: usize,
    pub rhs_evaluations: usize,
    /// Step size the integrator would try next.
    pub next_dt: f64,
}

impl IntegrationReport {
    pub fn completed(&self) -> bool {
        self.status == IntegrationStatus::Completed
    }

    pub fn into_result(self) -> Result<Self> {
        match self.status {
            IntegrationStatus::Completed => Ok(self),
            IntegrationStatus::NumericalFailure => Err(Error::NumericalFailure {
                t: self.t,
                message: "right-hand side produced NaN or Inf".to_string(),
            }),
            IntegrationStatus::StepSizeTooSmall => Err(Error::NumericalFailure {
                t: self.t,
                message: format!("step size {:e} fell below dt_min", self.next_dt),
            }),
            IntegrationStatus::MaxStepsExceeded => Err(Error::NumericalFailure {
                t: self.t,
                message: format!("exceeded {} steps", self.steps),
            }),
        }
    }
}
