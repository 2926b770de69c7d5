use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::aggregate::summarize;
use crate::cli::args::{Cli, Commands};
use crate::config::Settings;
use crate::error::{EtlError, Result};
use crate::models::WeatherRecord;
use crate::pipeline::{CityFetch, Pipeline};
use crate::storage::{BackupManager, Storage};

/// Dispatch the parsed command line to the matching operation.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let storage = Storage::open(&settings.storage).await?;

    match cli.command {
        Commands::Run { input } => {
            let fetches = load_fetches(&input, &settings.cities)?;
            info!(cities = fetches.len(), "starting pipeline run");

            let pipeline = Pipeline::new(storage);
            let summary = pipeline.run_once(fetches).await?;
            println!("Run complete: {summary}");
            pipeline.storage().close().await?;
        }
        Commands::Latest => {
            let latest = storage.query_latest().await?;
            if latest.is_empty() {
                println!("No records stored yet.");
            } else {
                let mut rows: Vec<_> = latest.into_iter().collect();
                rows.sort_by(|a, b| a.0.cmp(&b.0));
                for (_, record) in rows {
                    print_record(&record);
                }
            }
            storage.close().await?;
        }
        Commands::Query { limit } => {
            let records = storage.query_all().await?;
            let shown = if limit == 0 { records.len() } else { limit.min(records.len()) };
            for record in records.iter().take(shown) {
                print_record(record);
            }
            println!("{} of {} records shown", shown, records.len());
            storage.close().await?;
        }
        Commands::Summary => {
            let records = storage.query_all().await?;
            println!("{}", summarize(&records).render());
            storage.close().await?;
        }
        Commands::Backup => {
            let manager = BackupManager::new(&settings.backup_dir);
            let path = manager.create_backup(&storage).await?;
            println!("Backup written to {}", path.display());
            storage.close().await?;
        }
    }

    Ok(())
}

fn print_record(record: &WeatherRecord) {
    println!(
        "{}, {} | {:.1}°C ({}) | humidity {}% | wind {:.1} m/s | {} | {}",
        record.city,
        record.country,
        record.temperature_c,
        record.temp_category(),
        record.humidity_pct,
        record.wind_speed_ms,
        record.weather_description,
        record.collected_at.format("%Y-%m-%d %H:%M UTC"),
    );
}

/// Read a JSON array of raw provider payloads, pairing each entry with the
/// configured city at the same position. An entry carrying an "error" key is
/// treated as a fetch failure marker rather than a payload.
fn load_fetches(path: &Path, cities: &[String]) -> Result<Vec<CityFetch>> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let entries = value
        .as_array()
        .ok_or_else(|| EtlError::InvalidInput("expected a JSON array of payloads".into()))?;

    Ok(entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let hint = cities.get(idx).cloned().unwrap_or_default();
            match entry.get("error").and_then(Value::as_str) {
                Some(reason) => CityFetch::Failed {
                    city: entry
                        .get("city")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or(hint),
                    reason: reason.to_string(),
                },
                None => CityFetch::Fetched {
                    city: hint,
                    payload: entry.clone(),
                },
            }
        })
        .collect())
}
