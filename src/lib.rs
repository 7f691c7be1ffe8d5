//! Chart Enricher Library
//!
//! Incremental ingestion of a weekly chart into SQLite, enriched over
//! repeated runs with catalog metadata and listening statistics.

pub mod chart;
pub mod chart_store;
pub mod config;
pub mod enrichment;
pub mod ingestion;
pub mod lookup;
pub mod report;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use chart_store::{ChartStore, SqliteChartStore};
pub use enrichment::{CatalogEnrichmentEngine, StatisticsEnrichmentEngine};
pub use ingestion::IngestionEngine;
pub use lookup::{CatalogLookup, StatisticsLookup};
