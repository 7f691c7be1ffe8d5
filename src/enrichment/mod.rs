//! Bounded-batch enrichment of stored songs from external sources.
//!
//! Each engine run selects at most `batch_size` songs still missing its kind
//! of metadata, looks them up one at a time with a fixed pause between
//! calls, and returns a summary. Repeated runs converge on a fully enriched
//! store. Individual lookup failures never fail a run; store failures do.

mod catalog;
mod statistics;

pub use catalog::{
    release_year_from_date, CatalogEnrichmentEngine, CatalogEnrichmentSettings, CatalogRunSummary,
};
pub use statistics::{StatisticsEnrichmentEngine, StatisticsEnrichmentSettings, StatisticsRunSummary};

use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);

/// Blocks between two consecutive external calls.
fn pause_between_requests(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
