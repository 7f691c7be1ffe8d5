use anyhow::{Context, Result};
use chart_enricher::chart::{fetch_chart, HttpChartSource};
use chart_enricher::config::{AppConfig, CliConfig, FileConfig};
use chart_enricher::lookup::{LastFmClient, SpotifyClient};
use chart_enricher::report::Report;
use chart_enricher::{
    CatalogEnrichmentEngine, ChartStore, IngestionEngine, SqliteChartStore,
    StatisticsEnrichmentEngine,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;
use cli_style::{
    get_styles, print_error, print_key_value, print_progress, print_section_footer,
    print_section_header, print_success, print_warning, TableBuilder,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[command(
    name = "chart-enricher",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about = "Builds a chart dataset and enriches it with catalog and listening metadata",
    styles = get_styles()
)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite chart database file (default: chart.db).
    #[clap(long, global = true, value_parser = parse_path)]
    pub db: Option<PathBuf>,

    /// Maximum number of songs written or enriched per run (default: 25).
    #[clap(long, global = true)]
    pub batch_size: Option<usize>,

    /// Pause between two external lookups, in milliseconds (default: 300).
    #[clap(long, global = true)]
    pub request_delay_ms: Option<u64>,

    /// URL of the chart page to ingest.
    #[clap(long, global = true)]
    pub chart_url: Option<String>,

    #[clap(long, global = true)]
    pub spotify_client_id: Option<String>,

    #[clap(long, global = true)]
    pub spotify_client_secret: Option<String>,

    #[clap(long, global = true)]
    pub lastfm_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the chart page and store up to one batch of new songs.
    Ingest,
    /// Look up one batch of unchecked songs in the Spotify catalog.
    EnrichCatalog,
    /// Fetch Last.fm listening statistics for one batch of songs.
    EnrichStats,
    /// Show how much enrichment work remains.
    Status,
    /// Aggregate the stored data and export it as CSV files.
    Report {
        /// Output directory for the CSV files (default: report).
        #[clap(long, value_parser = parse_path)]
        out: Option<PathBuf>,

        /// Print the report as JSON instead of writing CSV files.
        #[clap(long)]
        json: bool,
    },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        let report_dir = match &self.command {
            Command::Report { out, .. } => out.clone(),
            _ => None,
        };
        CliConfig {
            db_path: self.db.clone(),
            batch_size: self.batch_size,
            request_delay_ms: self.request_delay_ms,
            chart_url: self.chart_url.clone(),
            spotify_client_id: self.spotify_client_id.clone(),
            spotify_client_secret: self.spotify_client_secret.clone(),
            lastfm_api_key: self.lastfm_api_key.clone(),
            report_dir,
        }
    }
}

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    // Logs go to stderr so `report --json` output stays parseable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    match run(cli_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli_args: CliArgs) -> Result<()> {
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let store = Arc::new(
        SqliteChartStore::open(&config.db_path)
            .with_context(|| format!("Cannot use chart database {:?}", config.db_path))?,
    );

    match cli_args.command {
        Command::Ingest => ingest(&config, store),
        Command::EnrichCatalog => enrich_catalog(&config, store),
        Command::EnrichStats => enrich_stats(&config, store),
        Command::Status => status(store.as_ref()),
        Command::Report { json, .. } => report(&config, &store, json),
    }
}

fn ingest(config: &AppConfig, store: Arc<SqliteChartStore>) -> Result<()> {
    let source = HttpChartSource::new(&config.chart.url, config.chart.timeout)?;
    let entries = fetch_chart(&source)?;

    let inserted = IngestionEngine::new(store).ingest(&entries, config.batch_size)?;
    if inserted == 0 {
        print_warning("No new songs on the chart, nothing was inserted");
    } else {
        print_success(&format!(
            "Inserted {} new songs (batch size {})",
            inserted, config.batch_size
        ));
    }
    Ok(())
}

fn enrich_catalog(config: &AppConfig, store: Arc<SqliteChartStore>) -> Result<()> {
    let spotify = config.require_spotify()?;
    let lookup = Arc::new(SpotifyClient::new(&spotify.client_id, &spotify.client_secret)?);

    let summary = CatalogEnrichmentEngine::new(store, lookup, config.catalog_settings()).run()?;
    if summary.selected == 0 {
        print_success("All songs already checked against the catalog");
        return Ok(());
    }

    print_section_header("Catalog enrichment");
    print_key_value("Songs processed", &summary.selected.to_string());
    print_key_value("Matched", &summary.matched.to_string());
    print_key_value("No match", &summary.not_found.to_string());
    print_key_value("Lookup errors", &summary.lookup_errors.to_string());
    if !summary.columns_added.is_empty() {
        print_key_value("Columns added", &summary.columns_added.join(", "));
    }
    print_section_footer();
    print_success("Run again to process the next batch");
    Ok(())
}

fn enrich_stats(config: &AppConfig, store: Arc<SqliteChartStore>) -> Result<()> {
    let lastfm = config.require_lastfm()?;
    let lookup = Arc::new(LastFmClient::new(&lastfm.api_key)?);

    let summary =
        StatisticsEnrichmentEngine::new(store, lookup, config.statistics_settings()).run()?;
    if summary.selected == 0 {
        print_success("All songs already have listening statistics");
        return Ok(());
    }

    print_section_header("Statistics enrichment");
    print_key_value("Songs processed", &summary.selected.to_string());
    print_key_value("Saved", &summary.saved.to_string());
    print_key_value("No data", &summary.missing.to_string());
    print_key_value("Lookup errors", &summary.lookup_errors.to_string());
    print_section_footer();
    if summary.saved < summary.selected {
        print_warning("Songs without statistics will be retried on the next run");
    }
    Ok(())
}

fn status(store: &dyn ChartStore) -> Result<()> {
    let stats = store.store_stats()?;

    print_section_header("Chart database");
    print_key_value("Artists", &stats.artists.to_string());
    print_key_value("Songs", &stats.songs.to_string());
    print_key_value("Albums", &stats.albums.to_string());
    print_progress("Catalog checked", stats.catalog_checked, stats.songs);
    print_progress("Catalog matched", stats.catalog_matched, stats.songs);
    print_progress("Statistics", stats.with_statistics, stats.songs);
    print_section_footer();

    if stats.catalog_pending() == 0 && stats.statistics_pending() == 0 {
        print_success("Nothing left to enrich");
    } else {
        print_warning(&format!(
            "{} songs await catalog lookup, {} await statistics",
            stats.catalog_pending(),
            stats.statistics_pending()
        ));
    }
    Ok(())
}

fn report(config: &AppConfig, store: &SqliteChartStore, json: bool) -> Result<()> {
    let report = Report::collect(store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let written = report.write_csv(&config.report_dir)?;
    print_top_artists(&report);
    print_success(&format!(
        "Wrote {} files to {}",
        written.len(),
        display_dir(&config.report_dir)
    ));
    Ok(())
}

fn print_top_artists(report: &Report) {
    let mut table = TableBuilder::new(&["#", "Artist", "Playcount"]);
    for (i, row) in report.artist_playcounts.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            row.artist.clone(),
            row.total_playcount.to_string(),
        ]);
    }
    if table.is_empty() {
        print_warning("No listening statistics stored yet");
    } else {
        table.print();
    }
}

fn display_dir(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
