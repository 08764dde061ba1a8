mod config_cmd;
mod record;
mod transfer;

use clap::ValueEnum;

pub use config_cmd::ConfigCommand;
pub use record::RecordCommand;
pub use transfer::{ExportCommand, ImportCommand};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
