//! Runtime layer for the finance dashboard.
//!
//! Talks to the hosted backend (table store and identity provider), owns the
//! chart slots, and runs the ingestion and forum workflows on top of the
//! data layer.

pub mod backend;
pub mod chart_board;
pub mod coordinator;
pub mod deadline;
pub mod forum;
pub mod http;
pub mod identity;
pub mod rest;
pub mod store;

pub use dash_core as core;
pub use dash_data as data;
