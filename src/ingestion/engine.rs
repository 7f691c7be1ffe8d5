use crate::chart::{normalize_artist, RawChartEntry};
use crate::chart_store::{ChartStore, NewSong};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct IngestionEngine {
    store: Arc<dyn ChartStore>,
}

impl IngestionEngine {
    pub fn new(store: Arc<dyn ChartStore>) -> Self {
        Self { store }
    }

    /// Writes at most `batch_cap` entries the store doesn't already hold,
    /// in input order, returning how many were written.
    ///
    /// An entry is identified by its title and normalized artist, so a song
    /// that comes back on a later chart keeps the rank it was first stored
    /// with. The existing identities are read once per call.
    pub fn ingest(&self, entries: &[RawChartEntry], batch_cap: usize) -> Result<usize> {
        let existing = self.store.existing_song_keys()?;
        let mut seen: HashSet<(String, String)> = HashSet::new();

        let batch: Vec<NewSong> = entries
            .iter()
            .filter_map(|entry| {
                let artist = normalize_artist(&entry.raw_artist);
                let title = entry.title.trim();
                if entry.rank == 0 || title.is_empty() || artist.is_empty() {
                    debug!("Dropping incomplete chart entry {:?}", entry);
                    return None;
                }
                Some(NewSong {
                    rank: entry.rank,
                    title: title.to_string(),
                    artist,
                })
            })
            .filter(|song| {
                let key = (song.title.clone(), song.artist.clone());
                !existing.contains(&key) && seen.insert(key)
            })
            .take(batch_cap)
            .collect();

        if batch.is_empty() {
            info!("No new chart entries to ingest");
            return Ok(0);
        }

        let inserted = self.store.insert_songs(&batch)?;
        info!(
            "Ingested {} new songs ({} candidates, {} already stored)",
            inserted,
            entries.len(),
            existing.len()
        );
        Ok(inserted)
    }
}
