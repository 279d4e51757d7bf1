use crate::config::PartialConfig;
use crate::error::Result;
use gpuma::engine::config::Config;

pub fn default_config_toml() -> Result<String> {
    PartialConfig::from(&Config::default()).to_toml_string()
}

pub fn run() -> Result<()> {
    print!("{}", default_config_toml()?);
    Ok(())
}
