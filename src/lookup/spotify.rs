//! Spotify Web API client for track search.
//!
//! Authenticates with the client-credentials flow and keeps the access token
//! until shortly before it expires.

use super::{CatalogAlbum, CatalogLookup, CatalogTrack, LookupError};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: String,
    popularity: Option<i64>,
    duration_ms: Option<i64>,
    explicit: Option<bool>,
    album: SpotifyAlbum,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    id: Option<String>,
    name: String,
    release_date: Option<String>,
}

impl SearchResponse {
    /// First usable track of the result page. Local or unavailable tracks
    /// come back without ids and are skipped.
    fn into_best_match(self) -> Option<CatalogTrack> {
        self.tracks?.items.into_iter().find_map(|track| {
            Some(CatalogTrack {
                id: track.id?,
                name: track.name,
                popularity: track.popularity,
                duration_ms: track.duration_ms,
                explicit: track.explicit,
                album: CatalogAlbum {
                    id: track.album.id?,
                    name: track.album.name,
                    release_date: track.album.release_date.filter(|d| !d.is_empty()),
                },
            })
        })
    }
}

impl SpotifyClient {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Spotify HTTP client")?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    fn access_token(&self) -> Result<String, LookupError> {
        let mut token = self.token.lock().unwrap();
        if let Some(cached) = token.as_ref() {
            if cached.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(cached.value.clone());
            }
        }

        debug!("Requesting new Spotify access token");
        let response = self
            .client
            .post(SPOTIFY_TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;

        if !response.status().is_success() {
            return Err(LookupError::Auth(format!(
                "token endpoint returned status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| LookupError::Decode(format!("token response: {}", e)))?;
        let value = body.access_token.clone();
        *token = Some(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });
        Ok(value)
    }

    fn search_query(title: &str, artist: &str) -> String {
        format!("track:{} artist:{}", title, artist)
    }
}

impl CatalogLookup for SpotifyClient {
    fn search_track(&self, title: &str, artist: &str) -> Result<Option<CatalogTrack>, LookupError> {
        let token = self.access_token()?;
        let query = Self::search_query(title, artist);

        let response = self
            .client
            .get(SPOTIFY_SEARCH_URL)
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("type", "track"), ("limit", "1")])
            .send()?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                // Revoked or expired early, next call fetches a new one
                *self.token.lock().unwrap() = None;
                return Err(LookupError::Auth("access token rejected".to_string()));
            }
            status => {
                return Err(LookupError::Status {
                    service: "Spotify",
                    status: status.as_u16(),
                })
            }
        }

        let body: SearchResponse = response
            .json()
            .map_err(|e| LookupError::Decode(format!("search response: {}", e)))?;
        Ok(body.into_best_match())
    }
}
