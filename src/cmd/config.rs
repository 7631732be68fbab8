//! Configuration view and validation commands (`hiring-board config`).

use std::path::Path;

use anyhow::Result;

use hiring_board::config::{BoardConfig, BoardToml, CONFIG_DIR, CONFIG_FILE};

use crate::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = BoardConfig::load(project_dir, cli.config.as_deref())?
                .with_env()
                .with_cli_overrides(cli.base_url.clone(), None, None);

            println!();
            println!("Hiring Board Configuration");
            println!("==========================");
            println!();
            if config.config_path.exists() {
                println!("Config file: {}", config.config_path.display());
            } else {
                println!("No board.toml found at {}", config.config_path.display());
                println!("Using defaults. Run 'hiring-board config init' to create one.");
            }
            println!();

            let toml = &config.toml;
            println!("[server]");
            println!("  base_url = \"{}\"", toml.server.base_url);
            println!("  timeout_secs = {}", toml.server.timeout_secs);
            println!("  page_size = {}", toml.server.page_size);
            println!();
            println!("[live]");
            println!("  max_retries = {}", toml.live.max_retries);
            println!("  base_delay_ms = {}", toml.live.base_delay_ms);
            println!("  max_delay_ms = {}", toml.live.max_delay_ms);
            println!();
            println!("[session]");
            match config.session() {
                Ok(Some(user)) => {
                    println!("  name = \"{}\"", user.name);
                    println!("  color = \"{}\"", user.color);
                }
                Ok(None) => println!("  (no session name set)"),
                Err(e) => println!("  invalid: {}", e),
            }
            println!();

            let warnings = config.validate();
            if !warnings.is_empty() {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            let config = BoardConfig::load(project_dir, cli.config.as_deref())?.with_env();
            let warnings = config.validate();
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
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => project_dir.join(CONFIG_DIR).join(CONFIG_FILE),
            };
            if path.exists() {
                println!("{} already exists, leaving it untouched.", path.display());
                return Ok(());
            }
            BoardToml::default().save(&path)?;
            println!("Created {}", path.display());
        }
    }

    Ok(())
}
