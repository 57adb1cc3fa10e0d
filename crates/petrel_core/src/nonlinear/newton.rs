use super::{
    ConvergenceCriterion, DivergenceReason, FiniteDifferenceJacobian, NewtonReport,
    NewtonSettings, NewtonStatus,
};
use crate::error::{Error, Result};
use crate::linalg::{AssemblyState, DenseLu, LinearSolver, Matrix, NormType, Vector};
use crate::traits::NonlinearSystem;

/// Newton-Raphson driver with backtracking line search.
///
/// Owns every scratch buffer used by a solve; they are sized once at
/// construction and reused by later solves of the same dimension.
pub struct NewtonSolver<L: LinearSolver = DenseLu> {
    settings: NewtonSettings,
    linear: L,
    residual: Vector,
    step: Vector,
    trial: Vector,
    trial_residual: Vector,
    jacobian: Matrix,
    fd: FiniteDifferenceJacobian,
}

impl NewtonSolver<DenseLu> {
    pub fn new(dim: usize, settings: NewtonSettings) -> Result<Self> {
        Self::with_linear_solver(dim, settings, DenseLu)
    }
}

impl<L: LinearSolver> NewtonSolver<L> {
    pub fn with_linear_solver(dim: usize, settings: NewtonSettings, linear: L) -> Result<Self> {
        if dim == 0 {
            return Err(Error::config("System has zero dimension."));
        }
        settings.validate()?;
        let residual = Vector::new(dim)?;
        Ok(Self {
            settings,
            linear,
            step: residual.duplicate(),
            trial: residual.duplicate(),
            trial_residual: residual.duplicate(),
            residual,
            jacobian: Matrix::new(dim, dim)?,
            fd: FiniteDifferenceJacobian::new(dim),
        })
    }

    pub fn settings(&self) -> &NewtonSettings {
        &self.settings
    }

    pub fn dimension(&self) -> usize {
        self.residual.len()
    }

    /// Solves F(x) = 0 starting from `x`, updating `x` in place.
    ///
    /// Usage and dimension errors abort with `Err`. Numerical failures
    /// (divergence, iteration cap) come back as `Ok` with the status set and
    /// `x` holding the last accepted iterate.
    pub fn solve(
        &mut self,
        system: &mut impl NonlinearSystem,
        x: &mut Vector,
    ) -> Result<NewtonReport> {
        let dim = self.dimension();
        Error::check_len("NewtonSolver::solve (system)", dim, system.dimension())?;
        Error::check_len("NewtonSolver::solve (iterate)", dim, x.len())?;
        x.read()?.restore();

        let settings = self.settings;
        let mut report = NewtonReport {
            status: NewtonStatus::MaxIterationsExceeded,
            iterations: 0,
            residual_norm: f64::NAN,
            initial_residual_norm: f64::NAN,
            residual_history: Vec::new(),
            function_evaluations: 0,
            jacobian_evaluations: 0,
        };

        evaluate_residual(system, x, &mut self.residual)?;
        report.function_evaluations += 1;
        let mut fnorm = self.residual.norm(NormType::Two)?;
        report.initial_residual_norm = fnorm;
        report.residual_norm = fnorm;
        report.residual_history.push(fnorm);

        if !fnorm.is_finite() {
            log::warn!("Newton: initial residual is not finite");
            report.status = NewtonStatus::Diverged(DivergenceReason::NonFiniteResidual);
            return Ok(report);
        }
        if fnorm == 0.0 || fnorm < settings.abs_tol {
            report.status = NewtonStatus::Converged(ConvergenceCriterion::AbsoluteResidual);
            return Ok(report);
        }
        let fnorm0 = fnorm;
        let mut jacobian_age = None::<usize>;

        loop {
            if report.iterations >= settings.max_iterations {
                log::debug!(
                    "Newton: iteration cap {} reached (‖F‖ = {fnorm:e})",
                    settings.max_iterations
                );
                report.status = NewtonStatus::MaxIterationsExceeded;
                return Ok(report);
            }

            let rebuild = match jacobian_age {
                Some(age) => age + 1 >= settings.jacobian_lag,
                None => true,
            };
            if rebuild {
                report.function_evaluations += self.build_jacobian(system, x)?;
                report.jacobian_evaluations += 1;
                jacobian_age = Some(0);
                if !self.jacobian.is_finite()? {
                    log::warn!("Newton: Jacobian contains NaN or Inf");
                    report.status = NewtonStatus::Diverged(DivergenceReason::NonFiniteJacobian);
                    return Ok(report);
                }
            } else {
                jacobian_age = jacobian_age.map(|age| age + 1);
            }

            // J·Δx = −F
            match self.linear.solve(&self.jacobian, &self.residual, &mut self.step) {
                Ok(()) => self.step.scale(-1.0)?,
                Err(Error::SingularMatrix) => {
                    log::warn!("Newton: singular Jacobian at iteration {}", report.iterations);
                    report.status = NewtonStatus::Diverged(DivergenceReason::SingularJacobian);
                    return Ok(report);
                }
                Err(err) => return Err(err),
            }

            let (lambda, trial_norm) = match self.line_search(system, x, fnorm, &mut report)? {
                LineSearch::Accepted { lambda, norm } => (lambda, norm),
                LineSearch::NonFinite => {
                    log::warn!("Newton: residual is not finite along the search direction");
                    report.status = NewtonStatus::Diverged(DivergenceReason::NonFiniteResidual);
                    return Ok(report);
                }
                LineSearch::Stalled { norm } => {
                    // x stays at the last accepted iterate.
                    let reason = if norm > settings.divergence_tolerance * fnorm0 {
                        DivergenceReason::ResidualGrowth
                    } else {
                        DivergenceReason::LineSearchFailed
                    };
                    log::warn!(
                        "Newton: line search could not decrease ‖F‖ = {fnorm:e} (best trial {norm:e})"
                    );
                    report.status = NewtonStatus::Diverged(reason);
                    return Ok(report);
                }
            };

            x.copy_from(&self.trial)?;
            self.residual.copy_from(&self.trial_residual)?;
            fnorm = trial_norm;
            report.iterations += 1;
            report.residual_norm = fnorm;
            report.residual_history.push(fnorm);

            let step_norm = lambda * self.step.norm(NormType::Two)?;
            let xnorm = x.norm(NormType::Two)?;
            log::debug!(
                "Newton iteration {}: ‖F‖ = {fnorm:e}, λ = {lambda}, ‖λΔx‖ = {step_norm:e}",
                report.iterations
            );

            if fnorm < settings.abs_tol {
                report.status = NewtonStatus::Converged(ConvergenceCriterion::AbsoluteResidual);
                return Ok(report);
            }
            if fnorm < settings.rel_tol * fnorm0 {
                report.status = NewtonStatus::Converged(ConvergenceCriterion::RelativeResidual);
                return Ok(report);
            }
            if step_norm < settings.step_tol * xnorm {
                report.status = NewtonStatus::Converged(ConvergenceCriterion::StepSize);
                return Ok(report);
            }
        }
    }

    /// Returns the number of residual evaluations spent.
    fn build_jacobian(&mut self, system: &mut impl NonlinearSystem, x: &Vector) -> Result<usize> {
        let xs = x.read()?;
        if system.has_jacobian() {
            system.jacobian(&xs, &mut self.jacobian)?;
            if self.jacobian.state() != AssemblyState::Assembled {
                return Err(Error::usage(
                    "Jacobian callback must assemble the matrix before returning",
                ));
            }
            Ok(0)
        } else {
            let fs = self.residual.read()?;
            self.fd.compute(system, &xs, &fs, &mut self.jacobian)
        }
    }

    /// Backtracks λ = 1, ½, ¼, … until the trial residual does not exceed
    /// `fnorm`. An accepted trial is left in `self.trial`/`self.trial_residual`.
    fn line_search(
        &mut self,
        system: &mut impl NonlinearSystem,
        x: &Vector,
        fnorm: f64,
        report: &mut NewtonReport,
    ) -> Result<LineSearch> {
        let mut lambda = 1.0;
        let mut best = f64::INFINITY;
        for backtracks in 0..=self.settings.line_search_max_backtracks {
            if backtracks > 0 {
                lambda *= 0.5;
                log::trace!("Newton: backtracking to λ = {lambda}");
            }
            self.trial.waxpy(lambda, &self.step, x)?;
            evaluate_residual(system, &self.trial, &mut self.trial_residual)?;
            report.function_evaluations += 1;
            let trial_norm = self.trial_residual.norm(NormType::Two)?;

            if trial_norm.is_finite() {
                if trial_norm <= fnorm {
                    return Ok(LineSearch::Accepted {
                        lambda,
                        norm: trial_norm,
                    });
                }
                best = best.min(trial_norm);
            }
        }
        Ok(if best.is_finite() {
            LineSearch::Stalled { norm: best }
        } else {
            LineSearch::NonFinite
        })
    }
}

enum LineSearch {
    Accepted { lambda: f64, norm: f64 },
    /// No trial reduced the residual; `norm` is the smallest finite one.
    Stalled { norm: f64 },
    /// Every trial produced NaN/Inf.
    NonFinite,
}

fn evaluate_residual(
    system: &mut impl NonlinearSystem,
    x: &Vector,
    out: &mut Vector,
) -> Result<()> {
    let xs = x.read()?;
    out.set(0.0)?;
    let mut fs = out.write()?;
    system.residual(&xs, &mut fs)
}
