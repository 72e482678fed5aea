//! Shared building blocks for the finance dashboard.
//!
//! Holds the error type, the canonical transaction and forum models, the
//! field-level coercion helpers used by the import pipeline, display
//! formatting, time helpers and the CLI settings layer.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{DashError, Result};
pub use models::{TransactionRecord, TransactionType};
