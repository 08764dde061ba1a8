use clap::Args;
use std::fs::File;
use std::path::PathBuf;

use healthpod_core::{export_csv, import_csv, Feature, ImportSummary};

use crate::config::Config;
use crate::pod::{self, Client};

#[derive(Args)]
pub struct ExportCommand {
    /// Feature to export (blood-pressure, vaccination, medication, diary)
    pub feature: Feature,

    /// CSV file to write
    pub file: PathBuf,
}

impl ExportCommand {
    pub async fn run(
        &self,
        client: &Client,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = pod::feature_dir(config, self.feature);

        // Read everything before touching the file so a failed export leaves
        // an existing file alone.
        let mut buffer = Vec::new();
        let rows = export_csv(client, &dir, self.feature, &mut buffer).await?;

        std::fs::write(&self.file, &buffer)
            .map_err(|e| format!("Failed to write {}: {}", self.file.display(), e))?;

        println!(
            "Exported {} {} record(s) to {}",
            rows,
            self.feature,
            self.file.display()
        );
        Ok(())
    }
}

#[derive(Args)]
pub struct ImportCommand {
    /// Feature to import into (blood-pressure, vaccination, medication, diary)
    pub feature: Feature,

    /// CSV file to read
    pub file: PathBuf,
}

impl ImportCommand {
    pub async fn run(
        &self,
        client: &Client,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = pod::feature_dir(config, self.feature);
        let file = File::open(&self.file)
            .map_err(|e| format!("Failed to open {}: {}", self.file.display(), e))?;

        let summary = import_csv(client, &dir, self.feature, file).await?;

        println!(
            "Imported {} {} record(s) from {}",
            summary.saved,
            self.feature,
            self.file.display()
        );
        if summary.skipped > 0 {
            println!("  Skipped {} invalid row(s)", summary.skipped);
        }
        if summary.duplicates > 0 {
            println!(
                "  {} row(s) repeated an earlier timestamp; the later row was kept",
                summary.duplicates
            );
        }
        check_import(&summary)
    }
}

/// An import succeeds only when every valid row was saved and at least one
/// row was.
fn check_import(summary: &ImportSummary) -> Result<(), Box<dyn std::error::Error>> {
    if summary.is_success() {
        Ok(())
    } else if summary.failed > 0 {
        Err(format!("{} row(s) could not be saved", summary.failed).into())
    } else {
        Err("No valid rows to import".into())
    }
}
