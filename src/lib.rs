//! Draw ingest, reconciliation and statistics for the 6/45 lottery.
//!
//! The `lotto-sync` binary wires these components into a scheduled pipeline
//! behind an HTTP API; downstream consumers can also use them directly.

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod notifier;
pub mod parser;
pub mod source;
pub mod stats;
pub mod sync;
pub mod types;
