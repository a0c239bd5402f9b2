pub mod compare;
pub mod init;
pub mod migrate;
pub mod missing;
pub mod normalize;
pub mod status;

use clap::{Parser, Subcommand};

use crate::settings::EmptyCollectionPolicy;

#[derive(Parser)]
#[command(
    name = "haul",
    version,
    about = "Migrate waste-collection records from a spreadsheet export into the collections store."
)]
pub struct Cli {
    /// Log debug detail to stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a settings file with defaults and create the data directory.
    Init {
        /// Directory for the migration ledger (default: platform data dir)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Store user recorded as the submitter of every collection
        #[arg(long)]
        submitter: Option<String>,
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Show configuration and previously migrated files.
    Status,
    /// Migrate the operational sheet (or a CSV export of it) into the store.
    Migrate {
        /// Path to a CSV export; without it the configured workbook is read
        file: Option<String>,
        /// Sheet (tab) to read instead of the configured operational sheet
        #[arg(long, conflicts_with = "file")]
        sheet: Option<String>,
        /// Collections per insert call (1-1000)
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,
        /// What to do with rows that carry no material weights
        #[arg(long, value_enum)]
        empty: Option<EmptyCollectionPolicy>,
        /// Transform and report without writing to the store
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Ignore the local ledger and send every row
        #[arg(long = "no-ledger")]
        no_ledger: bool,
    },
    /// Compare operational locations against the catalog sheet.
    Compare,
    /// List operational locations absent from the catalog sheet.
    Missing,
    /// Rewrite place labels in a sheet column to their canonical names.
    Normalize {
        /// Sheet (tab) name, e.g. OPERATIVO
        sheet: String,
        /// Header of the column to rewrite
        #[arg(long, default_value = "Plaza")]
        column: String,
        /// Show what would change without writing
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
}
