//! Common test infrastructure
//!
//! Fake collaborators and fixtures for the end-to-end pipeline tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{numbered_entries, TestDb};
//! use chart_enricher::IngestionEngine;
//!
//! #[test]
//! fn test_ingest() {
//!     let db = TestDb::new();
//!     let inserted = IngestionEngine::new(db.store.clone())
//!         .ingest(&numbered_entries(3), 25)
//!         .unwrap();
//!     assert_eq!(inserted, 3);
//! }
//! ```

mod fakes;
mod fixtures;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use fakes::{ScriptedCatalog, ScriptedStatistics, StaticChartSource};
#[allow(unused_imports)]
pub use fixtures::{catalog_track, chart_page, numbered_entries, song_count, TestDb};
