use crate::GlobalOpts;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

pub fn handle_config(action: ConfigAction, opts: &GlobalOpts) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = opts.load_config()?;
            println!("{}", "Configuration:".bold().green());
            if config.is_empty() {
                println!("  {}", "(defaults)".yellow());
            } else {
                for (key, value) in config.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
        }
        ConfigAction::Path => {
            let path = opts.config_path();
            forge_logger::debug(&format!("Exists: {}", path.exists()));
            println!("{}", path.display());
        }
    }
    Ok(())
}
