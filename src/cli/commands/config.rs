//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)?;
            println!("{}", toml_str);
        }
        ConfigAction::Path => {
            let path = Settings::default_config_path();
            if path.exists() {
                println!("{}", path.display());
            } else {
                println!("{}", path.display());
                Output::info("File does not exist yet. Create it with 'tekst init'.");
            }
        }
    }

    Ok(())
}
