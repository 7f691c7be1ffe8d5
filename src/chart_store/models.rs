use serde::Serialize;

/// A chart entry ready to be written, with its artist already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSong {
    pub rank: u32,
    pub title: String,
    pub artist: String,
}

/// A song selected for an enrichment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSong {
    pub song_id: i64,
    pub title: String,
    pub artist_id: i64,
    pub artist: String,
}

/// Catalog metadata to write onto a song.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    pub catalog_track_id: String,
    pub popularity: Option<i64>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub catalog_album_id: String,
    pub album_name: Option<String>,
    pub release_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Song {
    pub song_id: i64,
    pub rank: u32,
    pub title: String,
    pub artist_id: i64,
    pub artist: String,
    pub catalog_track_id: Option<String>,
    pub popularity: Option<i64>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub album_id: Option<i64>,
    pub release_year: Option<i32>,
    /// Unix seconds of the last catalog lookup, `None` if never looked up.
    pub catalog_checked_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackStatsRecord {
    pub song_id: i64,
    pub artist_id: i64,
    pub listeners: i64,
    pub playcount: i64,
}

/// Row counts describing how far enrichment has progressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub artists: usize,
    pub songs: usize,
    pub albums: usize,
    pub catalog_checked: usize,
    pub catalog_matched: usize,
    pub with_statistics: usize,
}

impl StoreStats {
    pub fn catalog_pending(&self) -> usize {
        self.songs.saturating_sub(self.catalog_checked)
    }

    pub fn statistics_pending(&self) -> usize {
        self.songs.saturating_sub(self.with_statistics)
    }
}
