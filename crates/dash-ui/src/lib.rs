//! Terminal UI layer for the finance dashboard.
//!
//! Provides themes, the header component, the terminal chart renderer that
//! backs the dashboard's three chart slots, forum views, and the event loops
//! built on top of [`ratatui`].

pub mod app;
pub mod charts;
pub mod components;
pub mod forum_view;
pub mod themes;

pub use dash_core as core;
