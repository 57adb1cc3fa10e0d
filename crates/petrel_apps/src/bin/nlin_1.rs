//! Newton solve of the exp/circle system with a finite-difference Jacobian.
use anyhow::Result;
use petrel_apps::programs::solve_exp_circle;

fn main() -> Result<()> {
    let options = petrel_apps::options_from_args(Default::default())?;
    let (x, _) = solve_exp_circle(&options, false)?;
    print!("{x}");
    Ok(())
}
