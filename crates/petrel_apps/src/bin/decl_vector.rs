use anyhow::Result;
use petrel_apps::programs::declare_and_dump;

fn main() -> Result<()> {
    petrel_apps::options_from_args(Default::default())?;
    declare_and_dump("datafile.dat")?;
    Ok(())
}
