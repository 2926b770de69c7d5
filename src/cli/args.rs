use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line interface for the weather ETL pipeline.
#[derive(Parser)]
#[command(name = "weather-etl")]
#[command(about = "Normalize, validate and store raw weather observations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a configuration file (defaults to weather-etl.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once over a file of raw provider payloads
    Run {
        /// JSON file holding one raw payload per configured city, in order
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the most recent stored record for each city
    Latest,

    /// Print stored records in collection order
    Query {
        /// Maximum number of records to print (0 prints everything)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Print aggregate statistics for the stored dataset
    Summary,

    /// Snapshot the dataset to a timestamped CSV backup
    Backup,
}
