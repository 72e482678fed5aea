//! Ingestion layer for the finance dashboard.
//!
//! Reads CSV and spreadsheet uploads into loosely-typed rows, normalizes them
//! into canonical transaction records, derives the three dashboard views and
//! describes the charts that display them.

pub mod aggregator;
pub mod charts;
pub mod normalizer;
pub mod reader;

pub use dash_core as core;
