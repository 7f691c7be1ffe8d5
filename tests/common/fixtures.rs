//! Test fixtures: chart markup, entry sets and on-disk databases.

use chart_enricher::chart::RawChartEntry;
use chart_enricher::lookup::{CatalogAlbum, CatalogTrack};
use chart_enricher::SqliteChartStore;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A chart database in a temporary directory.
///
/// The directory lives as long as this struct, so the file can be reopened
/// or inspected with a raw connection during the test.
pub struct TestDb {
    pub store: Arc<SqliteChartStore>,
    pub path: PathBuf,
    _dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("chart.db");
        let store = Arc::new(SqliteChartStore::open(&path).expect("Failed to open chart store"));
        Self {
            store,
            path,
            _dir: dir,
        }
    }

    /// Opens a second store on the same file, as a later run would.
    pub fn reopen(&self) -> Arc<SqliteChartStore> {
        Arc::new(SqliteChartStore::open(&self.path).expect("Failed to reopen chart store"))
    }

    pub fn raw_connection(&self) -> Connection {
        Connection::open(&self.path).expect("Failed to open raw connection")
    }
}

pub fn song_count(conn: &Connection) -> usize {
    conn.query_row("SELECT COUNT(*) FROM songs", [], |row| row.get::<_, i64>(0))
        .expect("Failed to count songs") as usize
}

/// `n` distinct entries ranked 1..=n, spread over seven artists.
pub fn numbered_entries(n: u32) -> Vec<RawChartEntry> {
    (1..=n)
        .map(|rank| RawChartEntry::new(rank, format!("Song {}", rank), format!("Artist {}", rank % 7)))
        .collect()
}

/// Chart page markup with one row per `(rank, title, artist label)`.
pub fn chart_page(rows: &[(u32, &str, &str)]) -> String {
    let rows: Vec<String> = rows
        .iter()
        .map(|(rank, title, artist)| {
            format!(
                r#"<div class="o-chart-results-list-row-container">
                    <ul class="o-chart-results-list-row">
                        <li><span class="c-label a-font-primary-bold-l">{rank}</span></li>
                        <li><span class="c-label">NEW</span></li>
                        <li class="lrv-u-width-100p">
                            <h3 id="title-of-a-story" class="c-title">{title}</h3>
                            <span class="c-label a-no-trucate">{artist}</span>
                        </li>
                    </ul>
                </div>"#
            )
        })
        .collect();
    format!(
        "<html><body><div class=\"chart-results-list\">{}</div></body></html>",
        rows.join("\n")
    )
}

pub fn catalog_track(id: &str, album_id: &str, album_name: &str, release_date: &str) -> CatalogTrack {
    CatalogTrack {
        id: id.to_string(),
        name: id.to_string(),
        popularity: Some(80),
        duration_ms: Some(200_000),
        explicit: Some(false),
        album: CatalogAlbum {
            id: album_id.to_string(),
            name: album_name.to_string(),
            release_date: Some(release_date.to_string()),
        },
    }
}
