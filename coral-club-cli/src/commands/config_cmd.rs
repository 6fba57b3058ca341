use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::Path;

use super::OutputFormat;
use crate::config::{Config, ConfigValue};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# coral configuration

# Base URL of coralclub-server
server_url: http://localhost:8080

# Keys holding the shared document and its revision counter
# state_key: coralclub:state
# rev_key: coralclub:rev

# How often `coral watch` polls for changes and expires holds
# poll_interval_ms: 1500
# sweep_interval_secs: 10

# How long a reservation hold lasts
# hold_minutes: 15

# Tent count used when seeding an empty store
# seed_count: 20

# Admin PIN, so admin commands need no --pin
# admin_pin: "1234"
"#;

fn print_value<T: std::fmt::Display>(name: &str, value: &ConfigValue<T>) {
    println!("{}: {}", name, value.value);
    println!("  source: {}", value.source);
    println!();
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        print_value("server_url", &config.server_url);
                        print_value("state_key", &config.state_key);
                        print_value("rev_key", &config.rev_key);
                        print_value("poll_interval_ms", &config.poll_interval_ms);
                        print_value("sweep_interval_secs", &config.sweep_interval_secs);
                        print_value("hold_minutes", &config.hold_minutes);
                        print_value("seed_count", &config.seed_count);
                        println!(
                            "admin_pin: {}",
                            if config.admin_pin.is_some() { "set" } else { "not set" }
                        );
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();
                if write_default_config(&config_path)? {
                    println!("Created config file: {}", config_path.display());
                    println!("\nEdit this file to customize your settings.");
                } else {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'coral config show' to view current configuration.");
                }
                Ok(())
            }
        }
    }
}

/// Writes the commented default config. Returns false if the file exists.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())?;
    Ok(true)
}
