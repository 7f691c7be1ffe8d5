use super::{pause_between_requests, DEFAULT_BATCH_SIZE, DEFAULT_REQUEST_DELAY};
use crate::chart_store::{ChartStore, TrackStatsRecord};
use crate::lookup::StatisticsLookup;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsEnrichmentSettings {
    pub batch_size: usize,
    pub request_delay: Duration,
}

impl Default for StatisticsEnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsRunSummary {
    pub selected: usize,
    pub saved: usize,
    pub missing: usize,
    pub lookup_errors: usize,
}

pub struct StatisticsEnrichmentEngine {
    store: Arc<dyn ChartStore>,
    lookup: Arc<dyn StatisticsLookup>,
    settings: StatisticsEnrichmentSettings,
}

impl StatisticsEnrichmentEngine {
    pub fn new(
        store: Arc<dyn ChartStore>,
        lookup: Arc<dyn StatisticsLookup>,
        settings: StatisticsEnrichmentSettings,
    ) -> Self {
        Self {
            store,
            lookup,
            settings,
        }
    }

    /// Fetches listening statistics for one batch of songs without a record.
    ///
    /// Only a complete answer creates a record. Songs with no answer, or
    /// whose lookup failed, stay selectable for the next run.
    pub fn run(&self) -> Result<StatisticsRunSummary> {
        let pending = self
            .store
            .songs_needing_statistics(self.settings.batch_size)?;

        let mut summary = StatisticsRunSummary {
            selected: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            info!("All songs already have listening statistics");
            return Ok(summary);
        }

        info!("Fetching listening statistics for {} songs", pending.len());

        for (index, song) in pending.iter().enumerate() {
            if index > 0 {
                pause_between_requests(self.settings.request_delay);
            }

            match self.lookup.track_stats(&song.artist, &song.title) {
                Ok(Some(stats)) => {
                    self.store.insert_track_stats(&TrackStatsRecord {
                        song_id: song.song_id,
                        artist_id: song.artist_id,
                        listeners: stats.listeners,
                        playcount: stats.playcount,
                    })?;
                    debug!(
                        "Saved statistics for {} by {}: listeners={}, playcount={}",
                        song.title, song.artist, stats.listeners, stats.playcount
                    );
                    summary.saved += 1;
                }
                Ok(None) => {
                    debug!("No statistics for {} by {}, skipping", song.title, song.artist);
                    summary.missing += 1;
                }
                Err(e) => {
                    warn!(
                        "Statistics lookup failed for {} by {}: {}",
                        song.title, song.artist, e
                    );
                    summary.lookup_errors += 1;
                }
            }
        }

        info!(
            "Statistics enrichment complete: {} saved, {} missing, {} errors",
            summary.saved, summary.missing, summary.lookup_errors
        );
        Ok(summary)
    }
}
