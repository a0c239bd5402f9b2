use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};
use tracing::info;

use crate::error::{HaulError, Result};
use crate::fmt::{count, kg, percent};
use crate::importer::read_source_rows;
use crate::ledger::{Ledger, LedgerSplit};
use crate::loader::{BatchLoader, LoadSummary};
use crate::normalizer::AliasTable;
use crate::reference::build_reference_index;
use crate::reporter::Progress;
use crate::settings::{load_settings, EmptyCollectionPolicy};
use crate::sheets::{open_sheet_source, read_rows, SheetSource};
use crate::store::RestStore;
use crate::transformer::{prepare, MigrationContext};

/// Rows between progress lines while transforming.
const TRANSFORM_PROGRESS_EVERY: usize = 100;

pub struct MigrateOptions {
    pub batch_size: Option<usize>,
    pub empty: Option<EmptyCollectionPolicy>,
    pub dry_run: bool,
    pub no_ledger: bool,
}

/// Where the operational rows come from.
pub enum MigrateSource {
    Csv(PathBuf),
    /// A sheet of the configured workbook; `None` means the operational one.
    Sheet(Option<String>),
}

impl MigrateSource {
    pub fn from_args(file: Option<String>, sheet: Option<String>) -> Self {
        match file {
            Some(file) => MigrateSource::Csv(PathBuf::from(file)),
            None => MigrateSource::Sheet(sheet),
        }
    }
}

pub fn run(source: MigrateSource, opts: MigrateOptions) -> Result<()> {
    // Configuration errors surface before the store or the export is read.
    let settings = load_settings()?;
    let store_config = settings.store_config()?;
    let submitter_id = settings.require_submitter()?.to_string();
    let batch_size = settings.validate_batch_size(opts.batch_size)?;
    let aliases = AliasTable::new(&settings.place_aliases)?;
    let (reader, source_file) = match source {
        MigrateSource::Csv(path) => {
            if !path.is_file() {
                return Err(HaulError::Config(format!("{} not found", path.display())));
            }
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            (RowReader::Csv(path), label)
        }
        MigrateSource::Sheet(sheet) => {
            let sheet = sheet.unwrap_or_else(|| settings.sheets.operational.clone());
            (RowReader::Sheet(open_sheet_source(&settings)?), sheet)
        }
    };

    let store = RestStore::new(&store_config)?;
    let index = build_reference_index(&store)?;
    let rows = match &reader {
        RowReader::Csv(path) => read_source_rows(path)?,
        RowReader::Sheet(workbook) => read_rows(workbook.as_ref(), &source_file)?,
    };
    info!(rows = rows.len(), source = %source_file, "operational rows read");

    let ctx = MigrationContext {
        index,
        aliases,
        materials: settings.materials.clone(),
        columns: settings.columns.clone(),
        submitter_id,
        empty_collections: opts.empty.unwrap_or(settings.empty_collections),
    };
    let mut transform = Progress::new("transform", TRANSFORM_PROGRESS_EVERY);
    let prepared = prepare(&rows, &ctx, &mut transform);

    let ledger = if opts.dry_run || opts.no_ledger {
        None
    } else {
        Some(Ledger::open(&settings.ledger_path(), &source_file)?)
    };
    let split = match &ledger {
        Some(ledger) => ledger.split(prepared.collections)?,
        None => LedgerSplit {
            fresh: prepared.collections,
            ..Default::default()
        },
    };
    let LedgerSplit { fresh: pending, resend, already } = split;
    if already > 0 {
        info!(already, "rows skipped as already migrated");
    }
    if !resend.is_empty() {
        info!(collections = resend.len(), "line items pending from an earlier run");
    }

    let weight: f64 = pending
        .iter()
        .flat_map(|c| c.items.iter().map(|i| i.weight_kg))
        .sum();

    let mut load = Progress::new("load", 1);
    let summary = if opts.dry_run {
        LoadSummary::default()
    } else {
        let loader = match &ledger {
            Some(ledger) => BatchLoader::new(&store, batch_size).with_ledger(ledger),
            None => BatchLoader::new(&store, batch_size),
        };
        let mut summary = loader.load(&pending, &mut load);
        loader.resend_line_items(&resend, &mut load, &mut summary);
        summary
    };

    if let Some(ledger) = &ledger {
        info!(recorded = ledger.count()?, "ledger updated");
    }

    print_summary(&SummaryView {
        source_file: &source_file,
        rows: rows.len(),
        skipped: prepared.skipped,
        already,
        resend: resend.len(),
        pending: pending.len(),
        weight,
        dry_run: opts.dry_run,
        load: &summary,
    });
    print_samples(&transform);
    print_samples(&load);
    Ok(())
}

enum RowReader {
    Csv(PathBuf),
    Sheet(Box<dyn SheetSource>),
}

struct SummaryView<'a> {
    source_file: &'a str,
    rows: usize,
    skipped: usize,
    already: usize,
    resend: usize,
    pending: usize,
    weight: f64,
    dry_run: bool,
    load: &'a LoadSummary,
}

fn print_summary(view: &SummaryView) {
    let mut table = Table::new();
    table.set_header(vec!["", "Count"]);
    table.add_row(vec![Cell::new("Rows read"), Cell::new(count(view.rows))]);
    table.add_row(vec![
        Cell::new("Skipped"),
        Cell::new(format!("{} ({})", count(view.skipped), percent(view.skipped, view.rows))),
    ]);
    if view.already > 0 {
        table.add_row(vec![Cell::new("Already migrated"), Cell::new(count(view.already))]);
    }
    table.add_row(vec![Cell::new("To load"), Cell::new(count(view.pending))]);
    if view.resend > 0 {
        table.add_row(vec![
            Cell::new("Line items to resend"),
            Cell::new(format!("{} collections", count(view.resend))),
        ]);
    }
    table.add_row(vec![Cell::new("Weight"), Cell::new(kg(view.weight))]);

    if !view.dry_run {
        let load = view.load;
        table.add_row(vec![Cell::new("Batches"), Cell::new(count(load.batches))]);
        table.add_row(vec![
            Cell::new("Collections loaded".green().bold()),
            Cell::new(count(load.collections_loaded)),
        ]);
        table.add_row(vec![
            Cell::new("Line items loaded"),
            Cell::new(count(load.line_items_loaded)),
        ]);
        if load.collections_resent > 0 {
            table.add_row(vec![
                Cell::new("Line items resent"),
                Cell::new(format!("{} collections", count(load.collections_resent))),
            ]);
        }
        if load.failed_batches > 0 {
            table.add_row(vec![
                Cell::new("Failed batches".red().bold()),
                Cell::new(count(load.failed_batches)),
            ]);
        }
        if load.partial_batches > 0 {
            table.add_row(vec![
                Cell::new("Line items not saved".red().bold()),
                Cell::new(format!(
                    "{} in {} batches",
                    count(load.line_items_failed),
                    count(load.partial_batches)
                )),
            ]);
        }
    }

    let title = if view.dry_run {
        format!("{} (dry run)", view.source_file)
    } else {
        view.source_file.to_string()
    };
    println!("{}\n{table}", title.bold());
}

fn print_samples(progress: &Progress) {
    if progress.samples().is_empty() {
        return;
    }
    println!();
    println!(
        "{}: {} rows failed, first {} problems:",
        progress.stage().yellow().bold(),
        count(progress.failed),
        progress.samples().len()
    );
    for sample in progress.samples() {
        println!("  {sample}");
    }
}
