//! FxPulse Core: domain records, data providers, and the incremental parquet stores.
//!
//! - Domain types (event counts, currency pairs and closes)
//! - Provider traits with Yahoo Finance, GDELT, and synthetic implementations
//! - Year-partitioned parquet stores with idempotent append
//! - Fetch orchestrator that refreshes each source from its own watermark

pub mod data;
pub mod domain;
