use super::{
    AdaptSettings, ButcherTableau, ExactFinalTime, IntegrationReport, IntegrationStatus,
    IntegratorSettings,
};
use crate::error::{Error, Result};
use crate::linalg::Vector;
use crate::traits::OdeSystem;

/// Relative slack under which a leftover interval counts as zero.
const TIME_EPSILON: f64 = 1e-10;

/// Result of computing one candidate step into the scratch buffers.
enum Attempt {
    /// A stage or the update contained NaN/Inf.
    NonFinite,
    /// Candidate stored in `y_new`, with the weighted error norm when
    /// adaptive.
    Ready { error: Option<f64> },
}

/// Explicit Runge-Kutta integrator over [`Vector`] state.
///
/// Stage buffers are owned by the integrator and reused between steps and
/// between calls to [`RungeKutta::integrate`].
pub struct RungeKutta {
    settings: IntegratorSettings,
    tableau: &'static ButcherTableau,
    stages: Vec<Vector>,
    stage_state: Vector,
    y_new: Vector,
    error: Vector,
    rhs_evaluations: usize,
}

impl RungeKutta {
    pub fn new(dim: usize, settings: IntegratorSettings) -> Result<Self> {
        settings.validate()?;
        let stage_state = Vector::new(dim)?;
        let tableau = settings.method.tableau();
        Ok(Self {
            settings,
            tableau,
            stages: (0..tableau.stages()).map(|_| stage_state.duplicate()).collect(),
            y_new: stage_state.duplicate(),
            error: stage_state.duplicate(),
            stage_state,
            rhs_evaluations: 0,
        })
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    pub fn tableau(&self) -> &'static ButcherTableau {
        self.tableau
    }

    pub fn dimension(&self) -> usize {
        self.stage_state.len()
    }

    /// Takes one fixed step of size `dt`, advancing `t` and `y`.
    ///
    /// Returns `false` without touching `t` or `y` if the step produced
    /// NaN/Inf.
    pub fn step(
        &mut self,
        system: &mut impl OdeSystem,
        t: &mut f64,
        y: &mut Vector,
        dt: f64,
    ) -> Result<bool> {
        self.check_dimensions(&*system, &*y)?;
        match self.attempt(system, *t, y, dt, false)? {
            Attempt::NonFinite => Ok(false),
            Attempt::Ready { .. } => {
                y.copy_from(&self.y_new)?;
                *t += dt;
                Ok(true)
            }
        }
    }

    /// Integrates from `t0` to `tf`, leaving the final state in `y`.
    pub fn integrate(
        &mut self,
        system: &mut impl OdeSystem,
        y: &mut Vector,
        t0: f64,
        tf: f64,
    ) -> Result<IntegrationReport> {
        self.check_dimensions(&*system, &*y)?;
        if !t0.is_finite() || !tf.is_finite() {
            return Err(Error::config("integration interval must be finite."));
        }
        if tf < t0 {
            return Err(Error::config(format!(
                "final time {tf} precedes initial time {t0}."
            )));
        }

        self.rhs_evaluations = 0;
        let adapt = self.settings.adaptive;
        let policy = self.settings.exact_final_time;
        let mut report = IntegrationReport {
            status: IntegrationStatus::Completed,
            t: t0,
            steps: 0,
            rejected_steps: 0,
            rhs_evaluations: 0,
            next_dt: self.settings.dt,
        };
        let mut t = t0;
        let mut dt = self.settings.dt;

        while t < tf {
            if report.steps >= self.settings.max_steps {
                log::warn!(
                    "integrator: reached max_steps = {} at t = {t}",
                    self.settings.max_steps
                );
                report.status = IntegrationStatus::MaxStepsExceeded;
                break;
            }

            let remaining = tf - t;
            let last = dt >= remaining - TIME_EPSILON * dt;
            let h = match policy {
                ExactFinalTime::MatchStep if last => remaining,
                _ => dt,
            };

            let error = match self.attempt(system, t, y, h, adapt.is_some())? {
                Attempt::NonFinite => {
                    log::warn!("integrator: non-finite right-hand side in step starting at t = {t}");
                    report.status = IntegrationStatus::NumericalFailure;
                    break;
                }
                Attempt::Ready { error } => error,
            };

            if let (Some(adapt), Some(error)) = (adapt, error) {
                let factor = self.step_factor(&adapt, error);
                if error.is_nan() || error > 1.0 {
                    report.rejected_steps += 1;
                    dt = h * factor.min(1.0);
                    log::trace!("integrator: rejected h = {h:e} (err = {error:.3}), retrying with {dt:e}");
                    if dt < adapt.dt_min {
                        report.status = IntegrationStatus::StepSizeTooSmall;
                        report.next_dt = dt;
                        break;
                    }
                    continue;
                }
                // A step clipped to land on tf says nothing about the next size.
                if !(last && policy == ExactFinalTime::MatchStep) {
                    dt = (h * factor).min(adapt.dt_max);
                }
            }

            y.copy_from(&self.y_new)?;
            t = if last && policy == ExactFinalTime::MatchStep {
                tf
            } else {
                t + h
            };
            report.steps += 1;
            report.t = t;
            log::trace!("integrator: step {} accepted, t = {t}", report.steps);

            if last {
                break;
            }
        }

        report.t = t;
        report.next_dt = dt;
        report.rhs_evaluations = self.rhs_evaluations;
        log::debug!(
            "integrator: {} finished with {:?} at t = {t} after {} steps ({} rejected)",
            self.tableau.name,
            report.status,
            report.steps,
            report.rejected_steps
        );
        Ok(report)
    }

    fn check_dimensions(&self, system: &impl OdeSystem, y: &Vector) -> Result<()> {
        Error::check_len("RungeKutta (system)", self.dimension(), system.dimension())?;
        Error::check_len("RungeKutta (state)", self.dimension(), y.len())
    }

    /// Scale factor safety·err^(−1/(q+1)), clamped to [fac_min, fac_max].
    fn step_factor(&self, adapt: &AdaptSettings, error: f64) -> f64 {
        if error == 0.0 {
            return adapt.fac_max;
        }
        if !error.is_finite() {
            return adapt.fac_min;
        }
        let exponent = -1.0 / (self.tableau.controller_order() as f64 + 1.0);
        (adapt.safety * error.powf(exponent)).clamp(adapt.fac_min, adapt.fac_max)
    }

    /// Evaluates every stage at (t, y) with step h and writes the candidate
    /// into `y_new`. `y` is left untouched.
    fn attempt(
        &mut self,
        system: &mut impl OdeSystem,
        t: f64,
        y: &Vector,
        h: f64,
        estimate_error: bool,
    ) -> Result<Attempt> {
        let tableau = self.tableau;
        let stage_count = if estimate_error {
            tableau.stages()
        } else {
            tableau.solution_stages()
        };

        for i in 0..stage_count {
            self.stage_state.copy_from(y)?;
            for (j, &a) in tableau.a[i].iter().enumerate() {
                if a != 0.0 {
                    self.stage_state.axpy(h * a, &self.stages[j])?;
                }
            }

            let k = &mut self.stages[i];
            k.set(0.0)?;
            {
                let ys = self.stage_state.read()?;
                let mut ks = k.write()?;
                system.rhs(t + tableau.c[i] * h, &ys, &mut ks)?;
            }
            self.rhs_evaluations += 1;
            if !k.is_finite()? {
                return Ok(Attempt::NonFinite);
            }
        }

        self.y_new.copy_from(y)?;
        for (j, &b) in tableau.b.iter().enumerate().take(stage_count) {
            if b != 0.0 {
                self.y_new.axpy(h * b, &self.stages[j])?;
            }
        }
        if !self.y_new.is_finite()? {
            return Ok(Attempt::NonFinite);
        }

        let error = match (estimate_error, tableau.error, self.settings.adaptive) {
            (true, Some(weights), Some(adapt)) => {
                self.error.set(0.0)?;
                for (j, &e) in weights.iter().enumerate() {
                    if e != 0.0 {
                        self.error.axpy(h * e, &self.stages[j])?;
                    }
                }
                Some(weighted_rms(&self.error, y, &self.y_new, &adapt)?)
            }
            _ => None,
        };
        Ok(Attempt::Ready { error })
    }
}

/// sqrt(mean((eᵢ / (atol + rtol·max(|yᵢ|, |ŷᵢ|)))²))
///
/// With `atol = 0` a component that is zero in both states has zero scale:
/// it contributes nothing when its error is zero too, and makes the norm
/// infinite otherwise.
fn weighted_rms(error: &Vector, y: &Vector, y_new: &Vector, adapt: &AdaptSettings) -> Result<f64> {
    let e = error.read()?;
    let y = y.read()?;
    let y_new = y_new.read()?;
    let sum: f64 = e
        .iter()
        .zip(y.iter().zip(y_new.iter()))
        .map(|(&ei, (yi, zi))| {
            let scale = adapt.atol + adapt.rtol * yi.abs().max(zi.abs());
            match (ei == 0.0, scale > 0.0) {
                (true, _) => 0.0,
                (false, true) => (ei / scale).powi(2),
                (false, false) => f64::INFINITY,
            }
        })
        .sum();
    Ok((sum / e.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ode::RkMethod;
    use crate::traits::FnRhs;
    use approx::assert_abs_diff_eq;

    fn growth() -> impl OdeSystem {
        FnRhs::new(1, |_t: f64, y: &[f64], out: &mut [f64]| out[0] = y[0])
    }

    fn integrate_growth(method: RkMethod, dt: f64) -> (f64, IntegrationReport) {
        let settings = IntegratorSettings {
            method,
            dt,
            ..IntegratorSettings::default()
        };
        let mut rk = RungeKutta::new(1, settings).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        let report = rk.integrate(&mut growth(), &mut y, 0.0, 1.0).unwrap();
        (y.to_vec().unwrap()[0], report)
    }

    #[test]
    fn rk4_exponential_growth() {
        let (y1, report) = integrate_growth(RkMethod::Rk4, 0.01);
        assert!(report.completed());
        assert_eq!(report.t, 1.0);
        assert_eq!(report.steps, 100);
        assert!((y1 - std::f64::consts::E).abs() < 1e-6);
        assert_eq!(report.rhs_evaluations, 400);
    }

    #[test]
    fn lower_order_methods_converge() {
        let (euler, _) = integrate_growth(RkMethod::Rk1fe, 0.01);
        assert!((euler - std::f64::consts::E).abs() < 2e-2);
        let (heun, _) = integrate_growth(RkMethod::Rk2a, 0.01);
        assert!((heun - std::f64::consts::E).abs() < 1e-3);
        let (bs, _) = integrate_growth(RkMethod::Rk3bs, 0.01);
        assert!((bs - std::f64::consts::E).abs() < 1e-5);
        let (dp, report) = integrate_growth(RkMethod::Rk5dp, 0.05);
        assert!((dp - std::f64::consts::E).abs() < 1e-8);
        // The trailing FSAL stage is skipped for fixed steps.
        assert_eq!(report.rhs_evaluations, 20 * 6);
        let (tsit, _) = integrate_growth(RkMethod::Tsit5, 0.05);
        assert!((tsit - std::f64::consts::E).abs() < 1e-6);
    }

    #[test]
    fn match_step_shrinks_last_step() {
        let (_, report) = integrate_growth(RkMethod::Rk4, 0.3);
        assert_eq!(report.steps, 4);
        assert_eq!(report.t, 1.0);
    }

    #[test]
    fn step_over_passes_final_time() {
        let settings = IntegratorSettings {
            dt: 0.3,
            exact_final_time: ExactFinalTime::StepOver,
            ..IntegratorSettings::default()
        };
        let mut rk = RungeKutta::new(1, settings).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        let report = rk.integrate(&mut growth(), &mut y, 0.0, 1.0).unwrap();
        assert_eq!(report.steps, 4);
        assert_abs_diff_eq!(report.t, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn empty_interval_takes_no_steps() {
        let mut rk = RungeKutta::new(1, IntegratorSettings::default()).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        let report = rk.integrate(&mut growth(), &mut y, 2.0, 2.0).unwrap();
        assert!(report.completed());
        assert_eq!(report.steps, 0);
        assert_eq!(y.to_vec().unwrap(), vec![1.0]);
        assert!(matches!(
            rk.integrate(&mut growth(), &mut y, 2.0, 1.0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn non_finite_rhs_keeps_last_valid_state() {
        let mut system = FnRhs::new(1, |t: f64, _y: &[f64], out: &mut [f64]| {
            out[0] = if t > 0.52 { f64::NAN } else { 1.0 };
        });
        let mut rk = RungeKutta::new(1, IntegratorSettings::default()).unwrap();
        let mut y = Vector::from_slice(&[0.0]).unwrap();
        let report = rk.integrate(&mut system, &mut y, 0.0, 1.0).unwrap();
        assert_eq!(report.status, IntegrationStatus::NumericalFailure);
        assert_eq!(report.steps, 5);
        assert_abs_diff_eq!(report.t, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(y.to_vec().unwrap()[0], 0.5, epsilon = 1e-12);
        assert!(matches!(
            report.into_result(),
            Err(Error::NumericalFailure { .. })
        ));
    }

    #[test]
    fn max_steps_caps_the_run() {
        let settings = IntegratorSettings {
            dt: 0.01,
            max_steps: 10,
            ..IntegratorSettings::default()
        };
        let mut rk = RungeKutta::new(1, settings).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        let report = rk.integrate(&mut growth(), &mut y, 0.0, 1.0).unwrap();
        assert_eq!(report.status, IntegrationStatus::MaxStepsExceeded);
        assert_eq!(report.steps, 10);
        assert_abs_diff_eq!(report.t, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn adaptive_rejects_oversized_first_step() {
        let settings = IntegratorSettings {
            method: RkMethod::Rk5dp,
            dt: 5.0,
            adaptive: Some(AdaptSettings {
                rtol: 1e-8,
                atol: 1e-8,
                ..AdaptSettings::default()
            }),
            ..IntegratorSettings::default()
        };
        let mut rk = RungeKutta::new(1, settings).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        let report = rk.integrate(&mut growth(), &mut y, 0.0, 1.0).unwrap();
        assert!(report.completed());
        assert!(report.rejected_steps > 0);
        assert_eq!(report.t, 1.0);
        assert!((y.to_vec().unwrap()[0] - std::f64::consts::E).abs() < 1e-6);
    }

    #[test]
    fn pure_relative_tolerance_handles_zero_components() {
        // y₀' = y₀, y₁' = 0 from (1, 0): y₁ has zero scale when atol = 0.
        let mut system = FnRhs::new(2, |_t: f64, y: &[f64], out: &mut [f64]| {
            out[0] = y[0];
            out[1] = 0.0;
        });
        let settings = IntegratorSettings {
            method: RkMethod::Rk5dp,
            adaptive: Some(AdaptSettings {
                rtol: 1e-8,
                atol: 0.0,
                ..AdaptSettings::default()
            }),
            ..IntegratorSettings::default()
        };
        let mut rk = RungeKutta::new(2, settings).unwrap();
        let mut y = Vector::from_slice(&[1.0, 0.0]).unwrap();
        let report = rk.integrate(&mut system, &mut y, 0.0, 5.0).unwrap();

        assert!(report.completed(), "{report:?}");
        assert_eq!(report.t, 5.0);
        assert!(report.next_dt.is_finite());
        assert!(report.steps > 10);
        let y = y.to_vec().unwrap();
        let exact = 5.0_f64.exp();
        assert!((y[0] - exact).abs() / exact < 1e-5, "y0 = {}", y[0]);
        assert_eq!(y[1], 0.0);
    }

    #[test]
    fn error_norm_with_zero_scale() {
        let adapt = AdaptSettings {
            rtol: 1e-6,
            atol: 0.0,
            ..AdaptSettings::default()
        };
        let zero = Vector::from_slice(&[0.0]).unwrap();
        let err = weighted_rms(&zero, &zero, &zero, &adapt).unwrap();
        assert_eq!(err, 0.0);

        let nonzero = Vector::from_slice(&[1e-3]).unwrap();
        let err = weighted_rms(&nonzero, &zero, &zero, &adapt).unwrap();
        assert_eq!(err, f64::INFINITY);
    }

    #[test]
    fn step_size_floor_stops_the_run() {
        let settings = IntegratorSettings {
            method: RkMethod::Rk5dp,
            dt: 0.5,
            adaptive: Some(AdaptSettings {
                rtol: 1e-12,
                atol: 1e-12,
                dt_min: 0.1,
                ..AdaptSettings::default()
            }),
            ..IntegratorSettings::default()
        };
        let mut rk = RungeKutta::new(1, settings).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        let report = rk.integrate(&mut growth(), &mut y, 0.0, 1.0).unwrap();

        assert_eq!(report.status, IntegrationStatus::StepSizeTooSmall);
        assert_eq!(report.steps, 0);
        assert!(report.rejected_steps > 0);
        assert!(report.next_dt < 0.1);
        assert_eq!(report.t, 0.0);
        assert_eq!(y.to_vec().unwrap(), vec![1.0]);
        assert!(matches!(
            report.into_result(),
            Err(Error::NumericalFailure { .. })
        ));
    }

    #[test]
    fn single_step_advances_time() {
        let mut rk = RungeKutta::new(1, IntegratorSettings::default()).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        let mut t = 0.0;
        assert!(rk.step(&mut growth(), &mut t, &mut y, 0.1).unwrap());
        assert_abs_diff_eq!(t, 0.1);
        assert_abs_diff_eq!(y.to_vec().unwrap()[0], 0.1_f64.exp(), epsilon = 1e-6);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let mut rk = RungeKutta::new(2, IntegratorSettings::default()).unwrap();
        let mut y = Vector::from_slice(&[1.0]).unwrap();
        assert!(matches!(
            rk.integrate(&mut growth(), &mut y, 0.0, 1.0),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
