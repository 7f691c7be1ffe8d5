//! ChartStore trait definition.
//!
//! Engines only talk to the store through this trait so they can be driven
//! against an in-memory database in tests.

use super::models::{CatalogMatch, NewSong, PendingSong, Song, StoreStats, TrackStatsRecord};
use anyhow::Result;
use std::collections::HashSet;

pub trait ChartStore: Send + Sync {
    // =========================================================================
    // Ingestion
    // =========================================================================

    /// All `(title, artist name)` pairs currently stored.
    fn existing_song_keys(&self) -> Result<HashSet<(String, String)>>;

    /// Inserts songs, creating artists on first sight, in a single
    /// transaction. Duplicates are ignored. Returns the number of songs
    /// actually written.
    fn insert_songs(&self, songs: &[NewSong]) -> Result<usize>;

    // =========================================================================
    // Catalog enrichment
    // =========================================================================

    /// Adds any enrichment column or table the live database lacks.
    /// Returns the names of the columns that were added.
    fn ensure_enrichment_schema(&self) -> Result<Vec<String>>;

    /// Songs never looked up in the catalog, oldest first.
    fn songs_needing_catalog(&self, limit: usize) -> Result<Vec<PendingSong>>;

    /// Writes catalog metadata onto a song, creating its album if needed,
    /// and marks the song as looked up.
    fn apply_catalog_match(&self, song_id: i64, found: &CatalogMatch) -> Result<()>;

    /// Nulls every catalog column of a song and marks it as looked up.
    fn clear_catalog_match(&self, song_id: i64) -> Result<()>;

    // =========================================================================
    // Statistics enrichment
    // =========================================================================

    /// Songs without a statistics record, oldest first.
    fn songs_needing_statistics(&self, limit: usize) -> Result<Vec<PendingSong>>;

    /// Returns false if the song already had a record.
    fn insert_track_stats(&self, stats: &TrackStatsRecord) -> Result<bool>;

    // =========================================================================
    // Inspection
    // =========================================================================

    fn get_song(&self, song_id: i64) -> Result<Option<Song>>;

    fn get_track_stats(&self, song_id: i64) -> Result<Option<TrackStatsRecord>>;

    fn store_stats(&self) -> Result<StoreStats>;
}
