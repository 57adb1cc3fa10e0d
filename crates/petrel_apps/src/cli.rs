//! Command-line flags shared by every program.

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use petrel_core::ode::{ExactFinalTime, RkMethod};
use petrel_core::options::Options;

/// Overrides for [`Options`]; any flag left out keeps the program default.
#[derive(Debug, Default, Parser)]
#[command(version, about = "Petrel reference program")]
pub struct Args {
    /// Stop when ‖F(x)‖ falls below this value
    #[arg(long)]
    pub abs_tol: Option<f64>,

    /// Stop when ‖F(x)‖ < rel_tol·‖F(x₀)‖
    #[arg(long)]
    pub rel_tol: Option<f64>,

    /// Stop when the Newton step is small relative to ‖x‖
    #[arg(long)]
    pub step_tol: Option<f64>,

    /// Newton iteration cap
    #[arg(long)]
    pub max_iterations: Option<usize>,

    #[arg(long)]
    pub line_search_max_backtracks: Option<usize>,

    /// Residual growth limit relative to ‖F(x₀)‖
    #[arg(long)]
    pub divergence_tolerance: Option<f64>,

    /// Iterations between Jacobian rebuilds
    #[arg(long)]
    pub jacobian_lag: Option<usize>,

    /// rk1fe, rk2a, rk3bs, rk4, rk5dp or tsit5
    #[arg(long, value_parser = RkMethod::from_str)]
    pub rk_method: Option<RkMethod>,

    /// Time step
    #[arg(long)]
    pub dt: Option<f64>,

    /// Integration horizon
    #[arg(long)]
    pub final_time: Option<f64>,

    #[arg(long)]
    pub max_steps: Option<usize>,

    /// matchstep or stepover
    #[arg(long, value_parser = ExactFinalTime::from_str)]
    pub exact_final_time: Option<ExactFinalTime>,
}

impl Args {
    /// Applies the given flags on top of `defaults` and validates the result.
    pub fn apply(&self, defaults: Options) -> Result<Options> {
        let mut options = defaults;
        macro_rules! override_with {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    options.$field = value;
                })*
            };
        }
        override_with!(
            abs_tol,
            rel_tol,
            step_tol,
            max_iterations,
            line_search_max_backtracks,
            divergence_tolerance,
            jacobian_lag,
            rk_method,
            dt,
            final_time,
            max_steps,
            exact_final_time,
        );
        options.validate().context("invalid options")?;
        Ok(options)
    }
}

/// Parses the process arguments on top of `defaults`.
pub fn options_from_args(defaults: Options) -> Result<Options> {
    Args::parse().apply(defaults)
}
