//! Chart ingestion: normalizes fetched entries and writes the ones the
//! store hasn't seen yet, a bounded batch at a time.

mod engine;

pub use engine::IngestionEngine;
