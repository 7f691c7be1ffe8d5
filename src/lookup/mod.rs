//! External metadata lookups.
//!
//! The enrichment engines only see the [`CatalogLookup`] and
//! [`StatisticsLookup`] traits; [`SpotifyClient`] and [`LastFmClient`] are
//! the production implementations.

mod lastfm;
mod spotify;

pub use lastfm::LastFmClient;
pub use spotify::SpotifyClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogAlbum {
    pub id: String,
    pub name: String,
    /// `YYYY-MM-DD`, `YYYY-MM` or `YYYY` depending on the album.
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    pub popularity: Option<i64>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub album: CatalogAlbum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackStats {
    pub listeners: i64,
    pub playcount: i64,
}

pub trait CatalogLookup: Send + Sync {
    /// Best catalog match for a song, `None` when the catalog has nothing.
    fn search_track(&self, title: &str, artist: &str) -> Result<Option<CatalogTrack>, LookupError>;
}

pub trait StatisticsLookup: Send + Sync {
    /// Listener and play counts for a track, `None` when either is unknown.
    fn track_stats(&self, artist: &str, title: &str) -> Result<Option<TrackStats>, LookupError>;
}
