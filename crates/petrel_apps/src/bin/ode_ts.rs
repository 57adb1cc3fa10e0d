use anyhow::Result;
use petrel_apps::programs::{integrate_oscillator, ode_defaults};

fn main() -> Result<()> {
    let options = petrel_apps::options_from_args(ode_defaults())?;
    let summary = integrate_oscillator(&options)?;
    println!("{summary}");
    Ok(())
}
