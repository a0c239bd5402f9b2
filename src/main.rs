mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod ledger;
mod loader;
mod matcher;
mod models;
mod normalizer;
mod reconcile;
mod reference;
mod reporter;
mod settings;
mod sheets;
mod store;
mod transformer;

use clap::Parser;
use tracing_subscriber::{fmt as log_fmt, EnvFilter};

use cli::{Cli, Commands};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    log_fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init {
            data_dir,
            submitter,
            force,
        } => cli::init::run(data_dir, submitter, force),
        Commands::Status => cli::status::run(),
        Commands::Migrate {
            file,
            sheet,
            batch_size,
            empty,
            dry_run,
            no_ledger,
        } => cli::migrate::run(
            cli::migrate::MigrateSource::from_args(file, sheet),
            cli::migrate::MigrateOptions {
                batch_size,
                empty,
                dry_run,
                no_ledger,
            },
        ),
        Commands::Compare => cli::compare::run(),
        Commands::Missing => cli::missing::run(),
        Commands::Normalize {
            sheet,
            column,
            dry_run,
        } => cli::normalize::run(&sheet, &column, dry_run),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
