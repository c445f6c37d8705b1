use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use config_loader::{ConfigError, ConfigManager};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective backend config with credentials redacted
    Show,
    /// Validate a backend config file against the schema
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Config file (defaults to COPYDESK_CONFIG or .copydesk/backend.json)
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

pub fn handle(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(),
        ConfigCommands::Validate(args) => validate(args),
    }
}

fn show() -> Result<()> {
    let manager = ConfigManager::new();
    let config = manager
        .load_backend()
        .with_context(|| format!("Failed to load backend config ({:?})", manager.config_path()))?;
    let source = if manager.config_path().exists() {
        manager.config_path().display().to_string()
    } else {
        "environment".to_string()
    };
    println!("# source: {}", source);
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

fn validate(args: ValidateArgs) -> Result<()> {
    let manager = ConfigManager::new();
    let path = args
        .file
        .unwrap_or_else(|| manager.config_path().to_path_buf());

    match manager.validate_file(&path) {
        Ok(()) => {
            println!("✓ Valid backend config: {}", path.display());
            Ok(())
        }
        Err(ConfigError::ValidationFailed { errors }) => {
            eprintln!("✗ Invalid backend config: {}", path.display());
            for error in &errors {
                let pointer = if error.json_pointer.is_empty() {
                    "/"
                } else {
                    error.json_pointer.as_str()
                };
                eprintln!("  - {}: {}", pointer, error.message);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e).with_context(|| format!("Failed to validate {}", path.display())),
    }
}
