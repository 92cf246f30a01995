//! Configuration view and validation commands: `jobstatus config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;
use jobstatus::config::Config;

pub fn cmd_config(config_path: &Path, effective: &Config, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("jobstatus configuration");
            println!("=======================");
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found; using defaults.", config_path.display());
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!("[server]");
            println!("  host = \"{}\"", effective.server.host);
            println!("  port = {}", effective.server.port);
            println!("  db_path = \"{}\"", effective.server.db_path.display());
            println!("  cors_origins = {:?}", effective.server.cors_origins);
            println!("[auth]");
            // Never echo the secret itself.
            println!(
                "  secret = {}",
                if effective.auth.secret.is_empty() { "(empty)" } else { "(set)" }
            );
            println!("[logging]");
            println!("  filter = \"{}\"", effective.logging.filter);
            println!("  json = {}", effective.logging.json);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = effective.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                anyhow::bail!(
                    "{} already exists. Remove it first to regenerate.",
                    config_path.display()
                );
            }
            Config::default().save(config_path)?;
            println!("Created {}", config_path.display());
        }
    }

    Ok(())
}
