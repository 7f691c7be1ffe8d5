//! Read-only aggregate views over the chart database and their CSV export.

use crate::chart_store::SqliteChartStore;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Number of rows kept in each ranked view.
pub const RANKING_LIMIT: usize = 15;

/// Only entries at or above this chart position count towards frequencies.
pub const FREQUENCY_MAX_RANK: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub average_duration_ms: Option<f64>,
    pub average_playcount: Option<f64>,
    pub average_listeners: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistPlaycount {
    pub artist: String,
    pub total_playcount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRank {
    pub artist: String,
    pub avg_rank: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frequency {
    pub name: String,
    pub frequency: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub summary: SummaryStats,
    pub artist_playcounts: Vec<ArtistPlaycount>,
    pub average_artist_ranks: Vec<ArtistRank>,
    pub artist_frequency: Vec<Frequency>,
    pub album_frequency: Vec<Frequency>,
}

pub fn average_duration_ms(conn: &Connection) -> Result<Option<f64>> {
    Ok(conn.query_row("SELECT AVG(duration_ms) FROM songs", [], |r| r.get(0))?)
}

pub fn average_playcount(conn: &Connection) -> Result<Option<f64>> {
    Ok(conn.query_row("SELECT AVG(playcount) FROM track_stats", [], |r| r.get(0))?)
}

pub fn average_listeners(conn: &Connection) -> Result<Option<f64>> {
    Ok(conn.query_row("SELECT AVG(listeners) FROM track_stats", [], |r| r.get(0))?)
}

/// Artists by total play count across their stored songs, highest first.
pub fn artist_playcounts(conn: &Connection) -> Result<Vec<ArtistPlaycount>> {
    let mut stmt = conn.prepare_cached(
        "SELECT a.name, SUM(t.playcount) AS total_playcount
         FROM artists a JOIN track_stats t ON t.artist_id = a.artist_id
         GROUP BY a.artist_id
         ORDER BY total_playcount DESC, a.name
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![RANKING_LIMIT as i64], |row| {
            Ok(ArtistPlaycount {
                artist: row.get(0)?,
                total_playcount: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Artists by average chart rank, best first.
pub fn average_artist_ranks(conn: &Connection) -> Result<Vec<ArtistRank>> {
    let mut stmt = conn.prepare_cached(
        "SELECT a.name, AVG(s.rank) AS avg_rank
         FROM artists a JOIN songs s ON s.artist_id = a.artist_id
         GROUP BY a.artist_id
         ORDER BY avg_rank, a.name
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![RANKING_LIMIT as i64], |row| {
            Ok(ArtistRank {
                artist: row.get(0)?,
                avg_rank: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn artist_frequency(conn: &Connection) -> Result<Vec<Frequency>> {
    frequency_query(
        conn,
        "SELECT a.name, COUNT(*) AS frequency
         FROM songs s JOIN artists a ON a.artist_id = s.artist_id
         WHERE s.rank <= ?1
         GROUP BY a.artist_id
         ORDER BY frequency DESC, a.name
         LIMIT ?2",
    )
}

pub fn album_frequency(conn: &Connection) -> Result<Vec<Frequency>> {
    frequency_query(
        conn,
        "SELECT al.name, COUNT(*) AS frequency
         FROM songs s JOIN albums al ON al.album_id = s.album_id
         WHERE s.rank <= ?1 AND al.name IS NOT NULL
         GROUP BY al.name
         ORDER BY frequency DESC, al.name
         LIMIT ?2",
    )
}

fn frequency_query(conn: &Connection, sql: &str) -> Result<Vec<Frequency>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params![FREQUENCY_MAX_RANK, RANKING_LIMIT as i64], |row| {
            Ok(Frequency {
                name: row.get(0)?,
                frequency: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Report {
    pub fn collect(store: &SqliteChartStore) -> Result<Self> {
        store.with_conn(|conn| {
            Ok(Report {
                summary: SummaryStats {
                    average_duration_ms: average_duration_ms(conn)?,
                    average_playcount: average_playcount(conn)?,
                    average_listeners: average_listeners(conn)?,
                },
                artist_playcounts: artist_playcounts(conn)?,
                average_artist_ranks: average_artist_ranks(conn)?,
                artist_frequency: artist_frequency(conn)?,
                album_frequency: album_frequency(conn)?,
            })
        })
    }

    /// Writes one CSV file per view into `dir`, creating it if needed.
    /// Returns the written paths.
    pub fn write_csv(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let optional = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        let files: Vec<(&str, [&str; 2], Vec<[String; 2]>)> = vec![
            (
                "summary_stats.csv",
                ["metric", "value"],
                vec![
                    [
                        "average_track_duration_ms".to_string(),
                        optional(self.summary.average_duration_ms),
                    ],
                    [
                        "average_playcount".to_string(),
                        optional(self.summary.average_playcount),
                    ],
                    [
                        "average_listeners".to_string(),
                        optional(self.summary.average_listeners),
                    ],
                ],
            ),
            (
                "artist_playcounts.csv",
                ["artist", "total_playcount"],
                self.artist_playcounts
                    .iter()
                    .map(|r| [r.artist.clone(), r.total_playcount.to_string()])
                    .collect(),
            ),
            (
                "avg_artist_ranks.csv",
                ["artist", "avg_rank"],
                self.average_artist_ranks
                    .iter()
                    .map(|r| [r.artist.clone(), r.avg_rank.to_string()])
                    .collect(),
            ),
            (
                "artist_frequency.csv",
                ["artist", "frequency"],
                frequency_rows(&self.artist_frequency),
            ),
            (
                "album_frequency.csv",
                ["album", "frequency"],
                frequency_rows(&self.album_frequency),
            ),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (file_name, header, rows) in files {
            let path = dir.join(file_name);
            write_csv_file(&path, &header, &rows)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
        info!("Wrote {} report files to {}", written.len(), dir.display());
        Ok(written)
    }
}

fn frequency_rows(rows: &[Frequency]) -> Vec<[String; 2]> {
    rows.iter()
        .map(|r| [r.name.clone(), r.frequency.to_string()])
        .collect()
}

fn write_csv_file(path: &Path, header: &[&str; 2], rows: &[[String; 2]]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{},{}", csv_field(header[0]), csv_field(header[1]))?;
    for [first, second] in rows {
        writeln!(out, "{},{}", csv_field(first), csv_field(second))?;
    }
    out.flush()?;
    Ok(())
}

/// Quotes a field when it holds a delimiter, a quote or a line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
