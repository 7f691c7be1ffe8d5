mod file_config;

pub use file_config::{ChartConfig, FileConfig, LastFmConfig, ReportConfig, SpotifyConfig};

use crate::chart::{DEFAULT_CHART_URL, DEFAULT_FETCH_TIMEOUT};
use crate::enrichment::{
    CatalogEnrichmentSettings, StatisticsEnrichmentSettings, DEFAULT_BATCH_SIZE,
    DEFAULT_REQUEST_DELAY,
};
use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "chart.db";
pub const DEFAULT_REPORT_DIR: &str = "report";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub request_delay_ms: Option<u64>,
    pub chart_url: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub report_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub batch_size: usize,
    pub request_delay: Duration,
    pub chart: ChartSettings,
    pub report_dir: PathBuf,

    // Present only when credentials are configured
    pub spotify: Option<SpotifySettings>,
    pub lastfm: Option<LastFmSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSettings {
    pub url: String,
    pub timeout: Duration,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHART_URL.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFmSettings {
    pub api_key: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let batch_size = file
            .batch_size
            .or(cli.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }

        let request_delay = file
            .request_delay_ms
            .or(cli.request_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_DELAY);

        let chart_file = file.chart.unwrap_or_default();
        let chart = ChartSettings {
            url: chart_file
                .url
                .or_else(|| cli.chart_url.clone())
                .unwrap_or_else(|| DEFAULT_CHART_URL.to_string()),
            timeout: chart_file
                .timeout_sec
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FETCH_TIMEOUT),
        };

        let report_dir = file
            .report
            .and_then(|r| r.out_dir)
            .map(PathBuf::from)
            .or_else(|| cli.report_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIR));

        // Spotify credentials - TOML [spotify] section takes precedence over CLI args
        let spotify_file = file.spotify.unwrap_or_default();
        let client_id =
            non_empty(spotify_file.client_id).or_else(|| non_empty(cli.spotify_client_id.clone()));
        let client_secret = non_empty(spotify_file.client_secret)
            .or_else(|| non_empty(cli.spotify_client_secret.clone()));
        let spotify = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(SpotifySettings {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            _ => bail!("Both a Spotify client id and client secret must be provided together"),
        };

        let lastfm = non_empty(file.lastfm.and_then(|l| l.api_key))
            .or_else(|| non_empty(cli.lastfm_api_key.clone()))
            .map(|api_key| LastFmSettings { api_key });

        Ok(Self {
            db_path,
            batch_size,
            request_delay,
            chart,
            report_dir,
            spotify,
            lastfm,
        })
    }

    pub fn require_spotify(&self) -> Result<&SpotifySettings> {
        self.spotify.as_ref().ok_or_else(|| {
            anyhow!(
                "Spotify credentials missing: pass --spotify-client-id and \
                 --spotify-client-secret or add a [spotify] section to the config file"
            )
        })
    }

    pub fn require_lastfm(&self) -> Result<&LastFmSettings> {
        self.lastfm.as_ref().ok_or_else(|| {
            anyhow!(
                "Last.fm API key missing: pass --lastfm-api-key or add a [lastfm] section \
                 to the config file"
            )
        })
    }

    pub fn catalog_settings(&self) -> CatalogEnrichmentSettings {
        CatalogEnrichmentSettings {
            batch_size: self.batch_size,
            request_delay: self.request_delay,
        }
    }

    pub fn statistics_settings(&self) -> StatisticsEnrichmentSettings {
        StatisticsEnrichmentSettings {
            batch_size: self.batch_size,
            request_delay: self.request_delay,
        }
    }
}
