use anyhow::Result;
use rao_algo::RaoParameters;

pub fn handle() -> Result<()> {
    print!("{}", RaoParameters::default().to_toml_string()?);
    Ok(())
}
