//! Configuration view and validation commands: `linetrack config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;
use linetrack::config::{CliOverrides, LinetrackToml};

fn print_config(toml: &LinetrackToml) {
    println!("[server]");
    println!("  host = \"{}\"", toml.server.host);
    println!("  port = {}", toml.server.port);
    println!("  db_path = \"{}\"", toml.server.db_path.display());
    println!("  dev_mode = {}", toml.server.dev_mode);
    println!();
    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  format = \"{}\"", toml.logging.format);
    println!();
    println!("[limits]");
    println!(
        "  inspection_top_default = {}",
        toml.limits.inspection_top_default
    );
    println!("  inspection_top_max = {}", toml.limits.inspection_top_max);
    println!();
}

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Linetrack Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No config file at {}; using defaults.", config_path.display());
            }
            println!();

            // Effective values include LINETRACK_* environment overrides.
            let effective = LinetrackToml::resolve(config_path, &CliOverrides::default())?;
            print_config(&effective);

            if !config_path.exists() {
                println!("Run 'linetrack config init' to create a config file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No config file found. Using defaults (valid).");
                return Ok(());
            }

            let toml = LinetrackToml::load(config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("Config file already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            LinetrackToml::default().save(config_path)?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, db_path, dev_mode");
            println!("  - [logging] level, format");
            println!("  - [limits] inspection_top_default, inspection_top_max");
            println!();
        }
    }

    Ok(())
}
