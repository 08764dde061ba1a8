use clap::{Args, Subcommand};
use std::fs;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::Config;

const DEFAULT_CONFIG: &str = r#"# healthpod configuration

# Directory for the record cache and the local pod
# data_dir: ~/.local/share/healthpod

# Pod directory holding the feature directories
# pod_root: healthpod/data

# Remote pod server. Without one, records live in <data_dir>/pod.
# pod:
#   server_url: http://localhost:8080
#   api_key: your-secret-key-here
"#;

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

    /// Create a default config file
    Init,
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
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

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("pod_root: {}", config.pod_root.value);
                        println!("  source: {}", config.pod_root.source);
                        println!();

                        match &config.pod.server_url {
                            Some(url) => {
                                println!("pod: {}", url);
                                let key = if config.pod.api_key.is_some() {
                                    "set"
                                } else {
                                    "not set (saving and deleting will fail)"
                                };
                                println!("  api_key: {}", key);
                            }
                            None => {
                                println!("pod: local ({})", config.local_pod_dir().display());
                            }
                        }
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config_path.unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    return Err(format!(
                        "Config file already exists: {}",
                        config_path.display()
                    )
                    .into());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&config_path, DEFAULT_CONFIG)?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}
