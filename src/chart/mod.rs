//! Chart page access: fetching, row extraction and artist normalization.

mod extractor;
mod normalize;
mod source;

pub use extractor::{extract_chart_entries, RawChartEntry};
pub use normalize::normalize_artist;
pub use source::{
    fetch_chart, ChartError, ChartSource, HttpChartSource, DEFAULT_CHART_URL,
    DEFAULT_FETCH_TIMEOUT,
};
