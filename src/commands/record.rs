use chrono::Local;
use clap::{Args, Subcommand};

use healthpod_core::models::timestamp;
use healthpod_core::{
    latest_per_day, sort_newest_first, DeleteOutcome, Feature, FieldValue, Record, RecordCache,
    RecordError, Replacement,
};

use super::OutputFormat;
use crate::config::Config;
use crate::pod::{self, Client};

#[derive(Args)]
pub struct RecordCommand {
    #[command(subcommand)]
    pub command: RecordSubcommand,
}

#[derive(Subcommand)]
pub enum RecordSubcommand {
    /// List records, newest first
    List {
        /// Feature (blood-pressure, vaccination, medication, diary)
        feature: Feature,

        /// Show only the latest record of each day
        #[arg(long)]
        daily: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a new record
    Add {
        /// Feature (blood-pressure, vaccination, medication, diary)
        feature: Feature,

        /// When the observation was made (default: now)
        #[arg(long)]
        at: Option<String>,

        /// Field value (can be repeated)
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },

    /// Edit a record
    Edit {
        /// Feature (blood-pressure, vaccination, medication, diary)
        feature: Feature,

        /// Record index as shown by `record list`
        index: usize,

        /// New timestamp
        #[arg(long)]
        at: Option<String>,

        /// Field to change; an empty value clears an optional field (can be repeated)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        sets: Vec<String>,
    },

    /// Delete a record
    Delete {
        /// Feature (blood-pressure, vaccination, medication, diary)
        feature: Feature,

        /// Record index as shown by `record list`
        index: usize,
    },
}

impl RecordCommand {
    pub async fn run(
        &self,
        client: &Client,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            RecordSubcommand::List {
                feature,
                daily,
                format,
            } => {
                let mut records = list_with_cache(client, config, *feature).await?;
                if *daily {
                    records = latest_per_day(records);
                } else {
                    sort_newest_first(&mut records);
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    }
                    OutputFormat::Text => {
                        if records.is_empty() {
                            println!("No {} records found.", feature);
                            return Ok(());
                        }
                        // Indices address the full listing, so daily views omit them.
                        for (i, record) in records.iter().enumerate() {
                            let index = if *daily { None } else { Some(i) };
                            print_record(index, *feature, record);
                        }
                        println!("\nTotal: {} record(s)", records.len());
                    }
                }
                Ok(())
            }

            RecordSubcommand::Add {
                feature,
                at,
                fields,
            } => {
                let ts = match at {
                    Some(raw) => timestamp::parse(raw)?,
                    None => Local::now().naive_local(),
                };

                let mut record = Record::new(ts);
                for arg in fields {
                    let (name, value) = parse_assignment(*feature, arg)?;
                    if let Some(value) = value {
                        record.fields.insert(name.to_string(), value);
                    }
                }
                check_required(*feature, &record)?;

                let dir = pod::feature_dir(config, *feature);
                let outcome = client.save_record(&dir, &record, None).await?;
                println!("Saved {} record: {}", feature, outcome.name);
                Ok(())
            }

            RecordSubcommand::Edit {
                feature,
                index,
                at,
                sets,
            } => {
                if at.is_none() && sets.is_empty() {
                    return Err("Nothing to change. Use --at or --set NAME=VALUE.".into());
                }

                let dir = pod::feature_dir(config, *feature);
                let previous = record_at(client, config, *feature, *index).await?;

                let mut record = previous.clone();
                if let Some(raw) = at {
                    record.timestamp = timestamp::normalize(timestamp::parse(raw)?);
                }
                for arg in sets {
                    let (name, value) = parse_assignment(*feature, arg)?;
                    match value {
                        Some(value) => {
                            record.fields.insert(name.to_string(), value);
                        }
                        None => {
                            record.fields.remove(name);
                        }
                    }
                }
                check_required(*feature, &record)?;

                let outcome = client.save_record(&dir, &record, Some(&previous)).await?;
                println!("Updated {} record: {}", feature, outcome.name);
                if let Replacement::Retained(reason) = &outcome.replacement {
                    eprintln!(
                        "Warning: the previous version may still be listed ({}).",
                        reason
                    );
                }
                Ok(())
            }

            RecordSubcommand::Delete { feature, index } => {
                let dir = pod::feature_dir(config, *feature);
                let record = record_at(client, config, *feature, *index).await?;

                match client.delete_record(&dir, &record).await? {
                    DeleteOutcome::Deleted(names) => {
                        println!("Deleted {} record: {}", feature, names.join(", "))
                    }
                    DeleteOutcome::NotFound => {
                        println!("Record was already deleted: {}", record)
                    }
                }
                Ok(())
            }
        }
    }
}

/// Lists the records of `feature`, refreshing the cache on success and
/// falling back to it when the pod cannot be reached.
async fn list_with_cache(
    client: &Client,
    config: &Config,
    feature: Feature,
) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let cache = RecordCache::new(&config.data_dir.value);
    let dir = pod::feature_dir(config, feature);

    match client.list_records(&dir).await {
        Ok(records) => {
            if let Err(e) = cache.save(feature.dir_name(), &records) {
                tracing::warn!("Failed to update record cache: {}", e);
            }
            Ok(records)
        }
        Err(RecordError::StoreUnavailable(e)) => match cache.load(feature.dir_name())? {
            Some(records) => {
                eprintln!("Pod unavailable ({}). Showing cached records.", e);
                Ok(records)
            }
            None => Err(RecordError::StoreUnavailable(e).into()),
        },
        Err(e) => Err(e.into()),
    }
}

/// Fetches the record at `index` of the newest-first listing.
async fn record_at(
    client: &Client,
    config: &Config,
    feature: Feature,
    index: usize,
) -> Result<Record, Box<dyn std::error::Error>> {
    let dir = pod::feature_dir(config, feature);
    let mut records = client.list_records(&dir).await?;
    sort_newest_first(&mut records);

    let count = records.len();
    records.into_iter().nth(index).ok_or_else(|| {
        format!(
            "No {} record at index {} ({} record(s) stored)",
            feature, index, count
        )
        .into()
    })
}

/// Splits `name=value` and parses the value with the field's kind.
///
/// An empty value yields `None`.
fn parse_assignment(
    feature: Feature,
    arg: &str,
) -> Result<(&'static str, Option<FieldValue>), Box<dyn std::error::Error>> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("Invalid field '{}'. Use NAME=VALUE.", arg))?;

    let spec = feature.field(name.trim()).ok_or_else(|| {
        let names: Vec<&str> = feature.fields().iter().map(|f| f.name).collect();
        format!(
            "Unknown {} field '{}'. Valid fields: {}",
            feature,
            name.trim(),
            names.join(", ")
        )
    })?;

    if raw.trim().is_empty() {
        return Ok((spec.name, None));
    }
    let value = FieldValue::parse_as(spec.kind, raw)
        .map_err(|e| format!("Invalid value for '{}': {}", spec.name, e))?;
    Ok((spec.name, Some(value)))
}

fn check_required(feature: Feature, record: &Record) -> Result<(), Box<dyn std::error::Error>> {
    let missing = record.missing_required(feature);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("Missing required field(s): {}", missing.join(", ")).into())
    }
}

fn print_record(index: Option<usize>, feature: Feature, record: &Record) {
    let ts = timestamp::format(&record.timestamp);
    match index {
        Some(i) => println!("[{}] {}", i, ts),
        None => println!("{}", ts),
    }
    for spec in feature.fields() {
        if let Some(value) = record.get(spec.name) {
            println!("      {}: {}", spec.name, value);
        }
    }
}
