//! Record normalization: loosely-typed rows in, canonical
//! [`TransactionRecord`]s out.
//!
//! Column presence is checked once per batch on the first row. After that a
//! bad field never fails the batch: it is replaced by its default and
//! reported as a [`RowWarning`].

use chrono::{DateTime, Utc};
use dash_core::data_processors::{
    AmountProcessor, CategoryProcessor, TimestampProcessor, TypeProcessor,
};
use dash_core::error::{DashError, Result};
use dash_core::models::{RawRow, TransactionRecord, TransactionType};
use serde_json::Value;
use tracing::{debug, warn};

/// Columns every upload must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 4] = ["time", "type", "category", "amount"];

/// Which field of a row had to be defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Time,
    Type,
    Amount,
}

impl RowField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Type => "type",
            Self::Amount => "amount",
        }
    }
}

/// A soft, per-row problem that was repaired with a default.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWarning {
    /// 1-based index of the data row.
    pub row: usize,
    pub field: RowField,
    pub message: String,
}

/// Output of a batch run.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<TransactionRecord>,
    pub warnings: Vec<RowWarning>,
}

/// Fail with every missing required column named, in canonical order.
pub fn check_required_columns(first_row: &RawRow) -> Result<()> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !first_row.contains_key(**col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DashError::MissingColumns(missing))
    }
}

/// Stateless row → record converter.
pub struct RecordNormalizer;

impl RecordNormalizer {
    /// Normalize one row. `row_number` is 1-based and only used for warnings;
    /// `now` replaces an unusable `time`.
    ///
    /// Columns other than the four required ones are dropped.
    pub fn normalize_row(
        row: &RawRow,
        row_number: usize,
        now: DateTime<Utc>,
        warnings: &mut Vec<RowWarning>,
    ) -> TransactionRecord {
        let cell = |name: &str| row.get(name).unwrap_or(&Value::Null);

        let time = match TimestampProcessor::parse(cell("time")) {
            Some(t) => t,
            None => {
                let message = format!("Invalid date format at row {}, using current date", row_number);
                warn!("{}", message);
                warnings.push(RowWarning {
                    row: row_number,
                    field: RowField::Time,
                    message,
                });
                now
            }
        };

        let kind = match TypeProcessor::parse(cell("type")) {
            Some(k) => k,
            None => {
                let message = format!("Invalid type at row {}, defaulting to \"output\"", row_number);
                warn!("{}", message);
                warnings.push(RowWarning {
                    row: row_number,
                    field: RowField::Type,
                    message,
                });
                TransactionType::Output
            }
        };

        let amount = match AmountProcessor::parse(cell("amount")) {
            Some(a) => a,
            None => {
                let message = format!("Invalid amount at row {}, defaulting to 0", row_number);
                warn!("{}", message);
                warnings.push(RowWarning {
                    row: row_number,
                    field: RowField::Amount,
                    message,
                });
                0.0
            }
        };

        TransactionRecord {
            time,
            kind,
            category: CategoryProcessor::label(cell("category")),
            amount,
        }
    }

    /// Normalize a whole upload using the current instant as the fallback time.
    pub fn normalize_batch(rows: &[RawRow]) -> Result<NormalizedBatch> {
        Self::normalize_batch_at(rows, Utc::now())
    }

    /// Normalize a whole upload with an explicit fallback clock.
    ///
    /// Fails with [`DashError::NoData`] on an empty batch and with
    /// [`DashError::MissingColumns`] when the first row lacks a required
    /// column; in both cases no row is processed.
    pub fn normalize_batch_at(rows: &[RawRow], now: DateTime<Utc>) -> Result<NormalizedBatch> {
        let first = rows.first().ok_or(DashError::NoData)?;
        check_required_columns(first)?;

        let mut batch = NormalizedBatch {
            records: Vec::with_capacity(rows.len()),
            warnings: Vec::new(),
        };
        for (i, row) in rows.iter().enumerate() {
            let record = Self::normalize_row(row, i + 1, now, &mut batch.warnings);
            batch.records.push(record);
        }

        debug!(
            records = batch.records.len(),
            warnings = batch.warnings.len(),
            "Normalized batch"
        );
        Ok(batch)
    }
}
