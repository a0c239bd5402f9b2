use tracing::{info, warn};

use crate::ledger::Ledger;
use crate::models::{CollectionLineItem, PendingCollection};
use crate::reporter::Progress;
use crate::store::TargetStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub batches: usize,
    pub failed_batches: usize,
    /// Batches whose headers landed but whose line items did not.
    pub partial_batches: usize,
    pub collections_loaded: usize,
    pub line_items_loaded: usize,
    pub line_items_failed: usize,
    /// Collections from earlier runs whose line items were sent again.
    pub collections_resent: usize,
}

/// Pushes collections to the store in contiguous, order-preserving batches.
///
/// Line items are tied to headers by position in the store's response, so a
/// response with the wrong number of ids fails the whole batch. No retries
/// and no rollback: a failed batch is logged and the next one proceeds.
pub struct BatchLoader<'a, S: TargetStore> {
    store: &'a S,
    batch_size: usize,
    ledger: Option<&'a Ledger>,
}

impl<'a, S: TargetStore> BatchLoader<'a, S> {
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: &'a Ledger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn load(&self, collections: &[PendingCollection], progress: &mut Progress) -> LoadSummary {
        let mut summary = LoadSummary::default();
        let total = collections.len();
        let mut processed = 0usize;

        for (n, batch) in collections.chunks(self.batch_size).enumerate() {
            let batch_no = n + 1;
            summary.batches += 1;
            self.load_batch(batch_no, batch, progress, &mut summary);
            processed += batch.len();
            info!(
                batch = batch_no,
                processed,
                total,
                loaded = summary.collections_loaded,
                "batch done"
            );
        }
        progress.tick(total, total);
        summary
    }

    fn load_batch(
        &self,
        batch_no: usize,
        batch: &[PendingCollection],
        progress: &mut Progress,
        summary: &mut LoadSummary,
    ) {
        let first_row = batch.first().map_or(0, |c| c.row_index);
        let headers: Vec<_> = batch.iter().map(|c| c.header.clone()).collect();

        let ids = match self.store.insert_collections(&headers) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(batch = batch_no, error = %e, "header insert failed");
                summary.failed_batches += 1;
                progress.failure(batch.len(), format!("batch {batch_no} (from row {first_row}): {e}"));
                return;
            }
        };

        if ids.len() != batch.len() {
            warn!(
                batch = batch_no,
                sent = batch.len(),
                returned = ids.len(),
                "id count mismatch; line items not attributed"
            );
            summary.failed_batches += 1;
            progress.failure(
                batch.len(),
                format!(
                    "batch {batch_no} (from row {first_row}): sent {} headers, got {} ids",
                    batch.len(),
                    ids.len()
                ),
            );
            return;
        }

        summary.collections_loaded += batch.len();
        progress.success(batch.len());
        if let Some(ledger) = self.ledger {
            for (collection, id) in batch.iter().zip(&ids) {
                if let Err(e) = ledger.record(collection, id) {
                    warn!(row = collection.row_index, error = %e, "ledger write failed");
                }
            }
        }

        let items = attribute_line_items(batch, &ids);
        if items.is_empty() {
            return;
        }
        match self.store.insert_line_items(&items) {
            Ok(()) => {
                summary.line_items_loaded += items.len();
                self.mark_items_loaded(batch);
            }
            Err(e) => {
                warn!(batch = batch_no, items = items.len(), error = %e, "line item insert failed");
                summary.partial_batches += 1;
                summary.line_items_failed += items.len();
                progress.failure(
                    0,
                    format!(
                        "batch {batch_no} (from row {first_row}): line items not saved, \
                         re-run to resend: {e}"
                    ),
                );
            }
        }
    }

    /// Sends line items for headers an earlier run loaded but whose items
    /// never landed, using the collection ids the ledger kept.
    pub fn resend_line_items(
        &self,
        resend: &[(PendingCollection, String)],
        progress: &mut Progress,
        summary: &mut LoadSummary,
    ) {
        for (n, chunk) in resend.chunks(self.batch_size).enumerate() {
            let batch: Vec<PendingCollection> = chunk.iter().map(|(c, _)| c.clone()).collect();
            let ids: Vec<String> = chunk.iter().map(|(_, id)| id.clone()).collect();
            let items = attribute_line_items(&batch, &ids);
            match self.store.insert_line_items(&items) {
                Ok(()) => {
                    summary.collections_resent += batch.len();
                    summary.line_items_loaded += items.len();
                    progress.success(batch.len());
                    self.mark_items_loaded(&batch);
                }
                Err(e) => {
                    warn!(chunk = n + 1, items = items.len(), error = %e, "line item resend failed");
                    summary.line_items_failed += items.len();
                    progress.failure(
                        batch.len(),
                        format!("resend of collections {}: {e}", ids.join(", ")),
                    );
                }
            }
        }
    }

    fn mark_items_loaded(&self, batch: &[PendingCollection]) {
        let Some(ledger) = self.ledger else {
            return;
        };
        for collection in batch.iter().filter(|c| !c.items.is_empty()) {
            if let Err(e) = ledger.mark_items_loaded(&collection.fingerprint) {
                warn!(row = collection.row_index, error = %e, "ledger write failed");
            }
        }
    }
}

/// Stamps each collection's line items with the id at the same position.
/// Callers must have checked that `ids` and `batch` have equal length.
pub fn attribute_line_items(batch: &[PendingCollection], ids: &[String]) -> Vec<CollectionLineItem> {
    batch
        .iter()
        .zip(ids)
        .flat_map(|(collection, id)| {
            collection.items.iter().map(move |item| CollectionLineItem {
                collection_id: Some(id.clone()),
                ..item.clone()
            })
        })
        .collect()
}
