//! Ingestion coordinator: one uploaded file in, rendered charts and stored
//! records out.
//!
//! Pipeline: detect format → read (async, time-boxed) → parse → normalize →
//! aggregate → render → persist. Parse-level failures stop the pipeline
//! before anything is rendered or saved.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dash_core::error::{DashError, Result};
use dash_core::models::TransactionRecord;
use dash_data::aggregator::{BucketOrder, DashboardViews, TransactionAggregator};
use dash_data::charts::ChartOptions;
use dash_data::normalizer::{RecordNormalizer, RowWarning};
use dash_data::reader::{detect_format, read_rows, FileFormat};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chart_board::ChartBoard;
use crate::deadline::guarded;
use crate::store::TableStore;

/// Per-call switches.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Persist the records after rendering. `false` is a dry run.
    pub save: bool,
    pub order: BucketOrder,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            save: true,
            order: BucketOrder::FirstSeen,
        }
    }
}

/// What a completed import produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub path: PathBuf,
    pub format: FileFormat,
    pub records: Vec<TransactionRecord>,
    pub warnings: Vec<RowWarning>,
    pub views: DashboardViews,
    /// Rows the store acknowledged; `0` on a dry run.
    pub persisted: usize,
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The extension is not an accepted upload type; nothing happened.
    Ignored,
    Completed(IngestReport),
}

/// Clears the busy flag however the import ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct IngestionCoordinator {
    store: Arc<dyn TableStore>,
    board: Arc<ChartBoard>,
    table: String,
    timeout: Duration,
    busy: AtomicBool,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<dyn TableStore>,
        board: Arc<ChartBoard>,
        table: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            board,
            table: table.into(),
            timeout,
            busy: AtomicBool::new(false),
        }
    }

    /// `true` while an import is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Import `path`.
    ///
    /// Rejects with [`DashError::Busy`] while another import runs. The file
    /// read and the store insert each get the configured time budget and
    /// stop early when `cancel` fires. An insert failure is returned after
    /// the charts are already up.
    pub async fn ingest(
        &self,
        path: &Path,
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome> {
        let Some(format) = detect_format(path) else {
            info!("Ignoring {}: not a .csv, .xlsx or .xls file", path.display());
            return Ok(IngestOutcome::Ignored);
        };

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DashError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        info!(file = %path.display(), %format, "Importing");

        let owned_path = path.to_path_buf();
        let bytes = guarded(cancel, self.timeout, "Reading file", async {
            tokio::fs::read(&owned_path)
                .await
                .map_err(|source| DashError::FileRead {
                    path: owned_path.clone(),
                    source,
                })
        })
        .await?;

        let rows = tokio::task::spawn_blocking(move || read_rows(format, &bytes))
            .await
            .map_err(|e| DashError::Other(e.into()))??;

        let now = Utc::now();
        let batch = RecordNormalizer::normalize_batch_at(&rows, now)?;
        let views = TransactionAggregator::aggregate_all(&batch.records, now, options.order);

        if cancel.is_cancelled() {
            return Err(DashError::Cancelled("Import".to_string()));
        }
        self.board
            .show_all(&ChartOptions::from_views(&views))
            .await?;

        let persisted = if options.save {
            let payload = batch
                .records
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let stored = guarded(
                cancel,
                self.timeout,
                "Saving records",
                self.store.insert(&self.table, payload),
            )
            .await?;
            info!(rows = stored.len(), table = %self.table, "Data successfully saved");
            stored.len()
        } else {
            debug!("Dry run; records not saved");
            0
        };

        Ok(IngestOutcome::Completed(IngestReport {
            path: path.to_path_buf(),
            format,
            records: batch.records,
            warnings: batch.warnings,
            views,
            persisted,
        }))
    }
}
