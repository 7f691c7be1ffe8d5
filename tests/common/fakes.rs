//! In-process stand-ins for the chart page and the two lookup services.

use anyhow::Result;
use chart_enricher::chart::ChartSource;
use chart_enricher::lookup::{CatalogLookup, CatalogTrack, LookupError, StatisticsLookup, TrackStats};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub struct StaticChartSource(pub String);

impl ChartSource for StaticChartSource {
    fn fetch_page(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Catalog keyed by song title. Unknown titles have no match, titles marked
/// as failing return a lookup error. Every call is recorded.
#[derive(Default)]
pub struct ScriptedCatalog {
    tracks: HashMap<String, CatalogTrack>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, title: &str, track: CatalogTrack) -> Self {
        self.tracks.insert(title.to_string(), track);
        self
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CatalogLookup for ScriptedCatalog {
    fn search_track(&self, title: &str, _artist: &str) -> Result<Option<CatalogTrack>, LookupError> {
        self.calls.lock().unwrap().push(title.to_string());
        if self.failing.contains(title) {
            return Err(LookupError::Status {
                service: "catalog",
                status: 503,
            });
        }
        Ok(self.tracks.get(title).cloned())
    }
}

/// Statistics keyed by song title, with the same conventions as
/// [`ScriptedCatalog`].
#[derive(Default)]
pub struct ScriptedStatistics {
    stats: HashMap<String, TrackStats>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(mut self, title: &str, listeners: i64, playcount: i64) -> Self {
        self.stats.insert(
            title.to_string(),
            TrackStats {
                listeners,
                playcount,
            },
        );
        self
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl StatisticsLookup for ScriptedStatistics {
    fn track_stats(&self, _artist: &str, title: &str) -> Result<Option<TrackStats>, LookupError> {
        self.calls.lock().unwrap().push(title.to_string());
        if self.failing.contains(title) {
            return Err(LookupError::Decode("truncated body".to_string()));
        }
        Ok(self.stats.get(title).cloned())
    }
}
