use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod pod;

use commands::{ConfigCommand, ExportCommand, ImportCommand, RecordCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "healthpod")]
#[command(version)]
#[command(about = "Keep personal health records in a pod", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List, add, edit and delete records
    Record(RecordCommand),

    /// Export a feature's records to CSV
    Export(ExportCommand),

    /// Import records from CSV
    Import(ImportCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healthpod=warn,healthpod_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.clone())?;

    match cli.command {
        Some(Commands::Record(cmd)) => {
            let client = pod::open(&config);
            cmd.run(&client, &config).await?;
        }
        Some(Commands::Export(cmd)) => {
            let client = pod::open(&config);
            cmd.run(&client, &config).await?;
        }
        Some(Commands::Import(cmd)) => {
            let client = pod::open(&config);
            cmd.run(&client, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, cli.config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
