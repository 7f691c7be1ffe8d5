//! Fetching the chart page.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::extractor::{extract_chart_entries, RawChartEntry};

pub const DEFAULT_CHART_URL: &str = "https://www.billboard.com/charts/hot-100/";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Chart request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chart page returned status {0}")]
    Status(u16),

    #[error("Chart page contained no parsable entries")]
    NoEntries,
}

/// Something that can hand back the markup of the current chart.
pub trait ChartSource {
    fn fetch_page(&self) -> Result<String>;
}

pub struct HttpChartSource {
    client: Client,
    url: String,
}

impl HttpChartSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build chart HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn get(&self) -> Result<String, ChartError> {
        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChartError::Status(status.as_u16()));
        }
        Ok(response.text()?)
    }
}

impl ChartSource for HttpChartSource {
    fn fetch_page(&self) -> Result<String> {
        debug!("Fetching chart page from {}", self.url);
        self.get()
            .with_context(|| format!("Failed to fetch chart page {}", self.url))
    }
}

/// Fetches the page and extracts its entries.
///
/// A page without any recognisable row is an error: it almost always means
/// the markup changed, and ingesting nothing silently would hide that.
pub fn fetch_chart(source: &dyn ChartSource) -> Result<Vec<RawChartEntry>> {
    let html = source.fetch_page()?;
    let entries = extract_chart_entries(&html);
    if entries.is_empty() {
        return Err(ChartError::NoEntries.into());
    }
    info!("Extracted {} chart entries", entries.len());
    Ok(entries)
}
