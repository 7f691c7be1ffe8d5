use super::{pause_between_requests, DEFAULT_BATCH_SIZE, DEFAULT_REQUEST_DELAY};
use crate::chart_store::{CatalogMatch, ChartStore};
use crate::lookup::{CatalogLookup, CatalogTrack};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEnrichmentSettings {
    pub batch_size: usize,
    pub request_delay: Duration,
}

impl Default for CatalogEnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogRunSummary {
    pub selected: usize,
    pub matched: usize,
    pub not_found: usize,
    pub lookup_errors: usize,
    /// Enrichment columns that had to be added to the songs table.
    pub columns_added: Vec<String>,
}

pub struct CatalogEnrichmentEngine {
    store: Arc<dyn ChartStore>,
    lookup: Arc<dyn CatalogLookup>,
    settings: CatalogEnrichmentSettings,
}

impl CatalogEnrichmentEngine {
    pub fn new(
        store: Arc<dyn ChartStore>,
        lookup: Arc<dyn CatalogLookup>,
        settings: CatalogEnrichmentSettings,
    ) -> Self {
        Self {
            store,
            lookup,
            settings,
        }
    }

    /// Looks up one batch of songs that were never checked against the
    /// catalog.
    ///
    /// Every selected song ends up marked as checked: a song without a match,
    /// or whose lookup failed, gets its catalog columns cleared and is not
    /// selected again.
    pub fn run(&self) -> Result<CatalogRunSummary> {
        let columns_added = self.store.ensure_enrichment_schema()?;
        let pending = self.store.songs_needing_catalog(self.settings.batch_size)?;

        let mut summary = CatalogRunSummary {
            selected: pending.len(),
            columns_added,
            ..Default::default()
        };

        if pending.is_empty() {
            info!("All songs already checked against the catalog");
            return Ok(summary);
        }

        info!("Looking up {} songs in the catalog", pending.len());

        for (index, song) in pending.iter().enumerate() {
            if index > 0 {
                pause_between_requests(self.settings.request_delay);
            }

            match self.lookup.search_track(&song.title, &song.artist) {
                Ok(Some(track)) => {
                    debug!(
                        "Matched {} by {} to catalog track {} [{}]",
                        song.title, song.artist, track.name, track.id
                    );
                    self.store
                        .apply_catalog_match(song.song_id, &catalog_match(&track))?;
                    summary.matched += 1;
                }
                Ok(None) => {
                    debug!("No catalog track for {} by {}", song.title, song.artist);
                    self.store.clear_catalog_match(song.song_id)?;
                    summary.not_found += 1;
                }
                Err(e) => {
                    warn!(
                        "Catalog lookup failed for {} by {}: {}",
                        song.title, song.artist, e
                    );
                    self.store.clear_catalog_match(song.song_id)?;
                    summary.lookup_errors += 1;
                }
            }
        }

        info!(
            "Catalog enrichment complete: {} matched, {} not found, {} errors",
            summary.matched, summary.not_found, summary.lookup_errors
        );
        Ok(summary)
    }
}

fn catalog_match(track: &CatalogTrack) -> CatalogMatch {
    CatalogMatch {
        catalog_track_id: track.id.clone(),
        popularity: track.popularity,
        duration_ms: track.duration_ms,
        explicit: track.explicit,
        catalog_album_id: track.album.id.clone(),
        album_name: Some(track.album.name.clone()).filter(|n| !n.is_empty()),
        release_year: track
            .album
            .release_date
            .as_deref()
            .and_then(release_year_from_date),
    }
}

/// Leading four-digit year of a release date such as `2019-06-21`.
pub fn release_year_from_date(date: &str) -> Option<i32> {
    let digits: String = date
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}
