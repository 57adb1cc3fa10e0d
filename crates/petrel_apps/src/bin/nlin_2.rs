//! Newton solve of the exp/circle system with the analytic Jacobian.
use anyhow::Result;
use petrel_apps::programs::solve_exp_circle;

fn main() -> Result<()> {
    let options = petrel_apps::options_from_args(Default::default())?;
    let (x, report) = solve_exp_circle(&options, true)?;
    print!("{x}");
    log::debug!("jacobian evaluations: {}", report.jacobian_evaluations);
    Ok(())
}
