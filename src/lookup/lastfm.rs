//! Last.fm API client for track listening statistics.
//!
//! Rate limited to 5 requests per second per Last.fm API guidelines.

use super::{LookupError, StatisticsLookup, TrackStats};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(200); // 5 req/sec

pub struct LastFmClient {
    client: Client,
    api_key: String,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
struct TrackInfoResponse {
    track: Option<LastFmTrack>,
    error: Option<i64>,
    message: Option<String>,
}

// Counts arrive as decimal strings
#[derive(Deserialize)]
struct LastFmTrack {
    listeners: Option<String>,
    playcount: Option<String>,
}

impl TrackInfoResponse {
    fn into_stats(self) -> Option<TrackStats> {
        if let Some(code) = self.error {
            debug!(
                "Last.fm error {}: {}",
                code,
                self.message.as_deref().unwrap_or("no message")
            );
            return None;
        }
        let track = self.track?;
        let listeners = track.listeners?.trim().parse().ok()?;
        let playcount = track.playcount?.trim().parse().ok()?;
        Some(TrackStats {
            listeners,
            playcount,
        })
    }
}

impl LastFmClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Last.fm HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            last_request: Mutex::new(
                Instant::now()
                    .checked_sub(RATE_LIMIT_INTERVAL)
                    .unwrap_or_else(Instant::now),
            ),
        })
    }

    fn rate_limit(&self) {
        let mut last = self.last_request.lock().unwrap();
        let elapsed = last.elapsed();
        if elapsed < RATE_LIMIT_INTERVAL {
            std::thread::sleep(RATE_LIMIT_INTERVAL - elapsed);
        }
        *last = Instant::now();
    }

    fn track_info_url(&self, artist: &str, title: &str) -> String {
        format!(
            "{}?method=track.getInfo&api_key={}&artist={}&track={}&format=json",
            LASTFM_API_BASE,
            self.api_key,
            urlencoding::encode(artist),
            urlencoding::encode(title)
        )
    }
}

impl StatisticsLookup for LastFmClient {
    fn track_stats(&self, artist: &str, title: &str) -> Result<Option<TrackStats>, LookupError> {
        self.rate_limit();

        let response = self.client.get(self.track_info_url(artist, title)).send()?;

        if !response.status().is_success() {
            return Err(LookupError::Status {
                service: "Last.fm",
                status: response.status().as_u16(),
            });
        }

        let body: TrackInfoResponse = response
            .json()
            .map_err(|e| LookupError::Decode(format!("track.getInfo response: {}", e)))?;
        Ok(body.into_stats())
    }
}
