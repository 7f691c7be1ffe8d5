//! SQLite-backed chart store.
//!
//! The pipeline is single-writer, so one connection behind a mutex serves
//! both reads and writes.

use super::models::*;
use super::schema::{ALBUMS_TABLE, CHART_VERSIONED_SCHEMAS, SONGS_TABLE};
use super::trait_def::ChartStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

pub struct SqliteChartStore {
    conn: Mutex<Connection>,
}

impl SqliteChartStore {
    /// Opens (or creates) the chart database at `db_path`, bringing its
    /// schema up to date.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open chart database {}", db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::from_connection(conn)?;
        let stats = store.store_stats()?;
        info!(
            "Opened chart db {}: {} artists, {} songs, {} albums",
            db_path.display(),
            stats.artists,
            stats.songs,
            stats.albums
        );
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory chart database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrate_if_needed(&mut conn, CHART_VERSIONED_SCHEMAS)?;

        #[cfg(not(feature = "no_checks"))]
        if let Some(latest) = CHART_VERSIONED_SCHEMAS.last() {
            latest
                .validate(&conn)
                .context("Chart database does not match the expected schema")?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs read-only queries directly against the underlying connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    fn count(conn: &Connection, sql: &str) -> Result<usize> {
        let count: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn now_unix() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn parse_pending_row(row: &rusqlite::Row) -> rusqlite::Result<PendingSong> {
        Ok(PendingSong {
            song_id: row.get(0)?,
            title: row.get(1)?,
            artist_id: row.get(2)?,
            artist: row.get(3)?,
        })
    }
}

impl ChartStore for SqliteChartStore {
    fn existing_song_keys(&self) -> Result<HashSet<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.title, a.name FROM songs s JOIN artists a ON a.artist_id = s.artist_id",
        )?;
        let keys = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    fn insert_songs(&self, songs: &[NewSong]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut insert_artist =
                tx.prepare_cached("INSERT OR IGNORE INTO artists (name) VALUES (?1)")?;
            let mut select_artist =
                tx.prepare_cached("SELECT artist_id FROM artists WHERE name = ?1")?;
            let mut insert_song = tx.prepare_cached(
                "INSERT OR IGNORE INTO songs (rank, title, artist_id) VALUES (?1, ?2, ?3)",
            )?;

            for song in songs {
                insert_artist.execute(params![song.artist])?;
                let artist_id: i64 =
                    select_artist.query_row(params![song.artist], |r| r.get(0))?;
                let changed = insert_song.execute(params![song.rank, song.title, artist_id])?;
                if changed == 0 {
                    debug!("Skipping already stored song {} by {}", song.title, song.artist);
                }
                inserted += changed;
            }
        }
        tx.commit().context("Failed to commit ingested songs")?;
        Ok(inserted)
    }

    fn ensure_enrichment_schema(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        if ALBUMS_TABLE.create_if_missing(&conn)? {
            info!("Created table {}", ALBUMS_TABLE.name);
        }
        let added = SONGS_TABLE.add_missing_columns(&conn)?;
        Ok(added.into_iter().map(str::to_string).collect())
    }

    fn songs_needing_catalog(&self, limit: usize) -> Result<Vec<PendingSong>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.song_id, s.title, s.artist_id, a.name
             FROM songs s JOIN artists a ON a.artist_id = s.artist_id
             WHERE s.catalog_checked_at IS NULL
             ORDER BY s.song_id LIMIT ?1",
        )?;
        let songs = stmt
            .query_map(params![limit as i64], Self::parse_pending_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn apply_catalog_match(&self, song_id: i64, found: &CatalogMatch) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO albums (catalog_album_id, name) VALUES (?1, ?2)",
            params![found.catalog_album_id, found.album_name],
        )?;
        let album_id: i64 = tx.query_row(
            "SELECT album_id FROM albums WHERE catalog_album_id = ?1",
            params![found.catalog_album_id],
            |r| r.get(0),
        )?;

        let updated = tx.execute(
            "UPDATE songs SET catalog_track_id = ?1, popularity = ?2, duration_ms = ?3,
                 explicit = ?4, album_id = ?5, release_year = ?6, catalog_checked_at = ?7
             WHERE song_id = ?8",
            params![
                found.catalog_track_id,
                found.popularity,
                found.duration_ms,
                found.explicit,
                album_id,
                found.release_year,
                Self::now_unix(),
                song_id
            ],
        )?;
        if updated == 0 {
            bail!("Song {} does not exist", song_id);
        }

        tx.commit()?;
        Ok(())
    }

    fn clear_catalog_match(&self, song_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE songs SET catalog_track_id = NULL, popularity = NULL, duration_ms = NULL,
                 explicit = NULL, album_id = NULL, release_year = NULL, catalog_checked_at = ?1
             WHERE song_id = ?2",
            params![Self::now_unix(), song_id],
        )?;
        if updated == 0 {
            bail!("Song {} does not exist", song_id);
        }
        Ok(())
    }

    fn songs_needing_statistics(&self, limit: usize) -> Result<Vec<PendingSong>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.song_id, s.title, s.artist_id, a.name
             FROM songs s
             JOIN artists a ON a.artist_id = s.artist_id
             LEFT JOIN track_stats t ON t.song_id = s.song_id
             WHERE t.song_id IS NULL
             ORDER BY s.song_id LIMIT ?1",
        )?;
        let songs = stmt
            .query_map(params![limit as i64], Self::parse_pending_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn insert_track_stats(&self, stats: &TrackStatsRecord) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO track_stats (song_id, artist_id, listeners, playcount)
                 VALUES (?1, ?2, ?3, ?4)",
                params![stats.song_id, stats.artist_id, stats.listeners, stats.playcount],
            )
            .with_context(|| format!("Failed to store statistics for song {}", stats.song_id))?;
        Ok(inserted > 0)
    }

    fn get_song(&self, song_id: i64) -> Result<Option<Song>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.song_id, s.rank, s.title, s.artist_id, a.name, s.catalog_track_id,
                    s.popularity, s.duration_ms, s.explicit, s.album_id, s.release_year,
                    s.catalog_checked_at
             FROM songs s JOIN artists a ON a.artist_id = s.artist_id
             WHERE s.song_id = ?1",
        )?;
        let song = stmt
            .query_row(params![song_id], |row| {
                Ok(Song {
                    song_id: row.get(0)?,
                    rank: row.get(1)?,
                    title: row.get(2)?,
                    artist_id: row.get(3)?,
                    artist: row.get(4)?,
                    catalog_track_id: row.get(5)?,
                    popularity: row.get(6)?,
                    duration_ms: row.get(7)?,
                    explicit: row.get(8)?,
                    album_id: row.get(9)?,
                    release_year: row.get(10)?,
                    catalog_checked_at: row.get(11)?,
                })
            })
            .optional()?;
        Ok(song)
    }

    fn get_track_stats(&self, song_id: i64) -> Result<Option<TrackStatsRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT song_id, artist_id, listeners, playcount FROM track_stats WHERE song_id = ?1",
        )?;
        let stats = stmt
            .query_row(params![song_id], |row| {
                Ok(TrackStatsRecord {
                    song_id: row.get(0)?,
                    artist_id: row.get(1)?,
                    listeners: row.get(2)?,
                    playcount: row.get(3)?,
                })
            })
            .optional()?;
        Ok(stats)
    }

    fn store_stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().unwrap();
        Ok(StoreStats {
            artists: Self::count(&conn, "SELECT COUNT(*) FROM artists")?,
            songs: Self::count(&conn, "SELECT COUNT(*) FROM songs")?,
            albums: Self::count(&conn, "SELECT COUNT(*) FROM albums")?,
            catalog_checked: Self::count(
                &conn,
                "SELECT COUNT(*) FROM songs WHERE catalog_checked_at IS NOT NULL",
            )?,
            catalog_matched: Self::count(
                &conn,
                "SELECT COUNT(*) FROM songs WHERE catalog_track_id IS NOT NULL",
            )?,
            with_statistics: Self::count(&conn, "SELECT COUNT(*) FROM track_stats")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::BASE_DB_VERSION;
    use tempfile::TempDir;

    fn new_song(rank: u32, title: &str, artist: &str) -> NewSong {
        NewSong {
            rank,
            title: title.to_string(),
            artist: artist.to_string(),
        }
    }

    fn sample_match(track: &str, album: &str) -> CatalogMatch {
        CatalogMatch {
            catalog_track_id: track.to_string(),
            popularity: Some(87),
            duration_ms: Some(210_000),
            explicit: Some(false),
            catalog_album_id: album.to_string(),
            album_name: Some("Album".to_string()),
            release_year: Some(2021),
        }
    }

    fn store_with_songs(songs: &[NewSong]) -> SqliteChartStore {
        let store = SqliteChartStore::in_memory().unwrap();
        store.insert_songs(songs).unwrap();
        store
    }

    #[test]
    fn insert_songs_creates_artists_once() {
        let store = store_with_songs(&[
            new_song(1, "Levitating", "Dua Lipa"),
            new_song(2, "Houdini", "Dua Lipa"),
            new_song(3, "Flowers", "Miley Cyrus"),
        ]);

        let stats = store.store_stats().unwrap();
        assert_eq!(stats.artists, 2);
        assert_eq!(stats.songs, 3);

        let keys = store.existing_song_keys().unwrap();
        assert!(keys.contains(&("Houdini".to_string(), "Dua Lipa".to_string())));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn duplicate_songs_are_ignored_and_keep_rank() {
        let store = store_with_songs(&[new_song(4, "Flowers", "Miley Cyrus")]);

        let inserted = store
            .insert_songs(&[
                new_song(1, "Flowers", "Miley Cyrus"),
                new_song(2, "Vampire", "Olivia Rodrigo"),
            ])
            .unwrap();
        assert_eq!(inserted, 1);

        let flowers = store.get_song(1).unwrap().unwrap();
        assert_eq!(flowers.title, "Flowers");
        assert_eq!(flowers.rank, 4);
    }

    #[test]
    fn catalog_selection_skips_checked_songs() {
        let store = store_with_songs(&[
            new_song(1, "A", "X"),
            new_song(2, "B", "Y"),
            new_song(3, "C", "Z"),
        ]);

        store.clear_catalog_match(1).unwrap();
        store.apply_catalog_match(2, &sample_match("t2", "al1")).unwrap();

        let pending = store.songs_needing_catalog(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].song_id, 3);
        assert_eq!(pending[0].artist, "Z");
    }

    #[test]
    fn catalog_selection_is_oldest_first_and_limited() {
        let songs: Vec<NewSong> = (1..=5)
            .map(|i| new_song(i, &format!("Song {}", i), "Artist"))
            .collect();
        let store = store_with_songs(&songs);

        let pending = store.songs_needing_catalog(2).unwrap();
        let ids: Vec<i64> = pending.iter().map(|s| s.song_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn catalog_match_is_written_and_album_shared() {
        let store = store_with_songs(&[new_song(1, "A", "X"), new_song(2, "B", "X")]);

        store.apply_catalog_match(1, &sample_match("t1", "album-1")).unwrap();
        store.apply_catalog_match(2, &sample_match("t2", "album-1")).unwrap();

        let first = store.get_song(1).unwrap().unwrap();
        let second = store.get_song(2).unwrap().unwrap();
        assert_eq!(first.catalog_track_id.as_deref(), Some("t1"));
        assert_eq!(first.popularity, Some(87));
        assert_eq!(first.duration_ms, Some(210_000));
        assert_eq!(first.explicit, Some(false));
        assert_eq!(first.release_year, Some(2021));
        assert!(first.catalog_checked_at.is_some());
        assert_eq!(first.album_id, second.album_id);

        let stats = store.store_stats().unwrap();
        assert_eq!(stats.albums, 1);
        assert_eq!(stats.catalog_matched, 2);
        assert_eq!(stats.catalog_pending(), 0);
    }

    #[test]
    fn clearing_nulls_columns_but_marks_checked() {
        let store = store_with_songs(&[new_song(1, "A", "X")]);
        store.apply_catalog_match(1, &sample_match("t1", "album-1")).unwrap();

        store.clear_catalog_match(1).unwrap();

        let song = store.get_song(1).unwrap().unwrap();
        assert_eq!(song.catalog_track_id, None);
        assert_eq!(song.album_id, None);
        assert_eq!(song.release_year, None);
        assert!(song.catalog_checked_at.is_some());
    }

    #[test]
    fn catalog_writes_to_unknown_song_fail() {
        let store = SqliteChartStore::in_memory().unwrap();
        assert!(store.clear_catalog_match(42).is_err());
        assert!(store.apply_catalog_match(42, &sample_match("t", "a")).is_err());
    }

    #[test]
    fn statistics_selection_and_insert() {
        let store = store_with_songs(&[new_song(1, "A", "X"), new_song(2, "B", "Y")]);

        let pending = store.songs_needing_statistics(10).unwrap();
        assert_eq!(pending.len(), 2);

        let record = TrackStatsRecord {
            song_id: pending[0].song_id,
            artist_id: pending[0].artist_id,
            listeners: 1_200,
            playcount: 45_000,
        };
        assert!(store.insert_track_stats(&record).unwrap());
        assert!(!store.insert_track_stats(&record).unwrap());

        assert_eq!(store.get_track_stats(1).unwrap(), Some(record));
        let pending = store.songs_needing_statistics(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].song_id, 2);
        assert_eq!(store.store_stats().unwrap().statistics_pending(), 1);
    }

    #[test]
    fn statistics_for_unknown_song_violates_foreign_key() {
        let store = store_with_songs(&[new_song(1, "A", "X")]);
        let record = TrackStatsRecord {
            song_id: 99,
            artist_id: 1,
            listeners: 1,
            playcount: 1,
        };
        assert!(store.insert_track_stats(&record).is_err());
    }

    #[test]
    fn fresh_store_needs_no_schema_changes() {
        let store = SqliteChartStore::in_memory().unwrap();
        assert!(store.ensure_enrichment_schema().unwrap().is_empty());
    }

    #[test]
    fn reopening_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("chart.db");

        {
            let store = SqliteChartStore::open(&db_path).unwrap();
            store.insert_songs(&[new_song(1, "A", "X")]).unwrap();
        }

        let store = SqliteChartStore::open(&db_path).unwrap();
        assert_eq!(store.store_stats().unwrap().songs, 1);
    }

    #[test]
    fn unversioned_database_is_upgraded_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("legacy.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE artists (artist_id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
                 CREATE TABLE songs (
                     song_id INTEGER PRIMARY KEY,
                     rank INTEGER NOT NULL,
                     title TEXT NOT NULL,
                     artist_id INTEGER NOT NULL REFERENCES artists(artist_id),
                     UNIQUE (title, artist_id)
                 );
                 INSERT INTO artists (name) VALUES ('Adele');
                 INSERT INTO songs (rank, title, artist_id) VALUES (9, 'Easy On Me', 1);",
            )
            .unwrap();
        }

        let store = SqliteChartStore::open(&db_path).unwrap();
        let song = store.get_song(1).unwrap().unwrap();
        assert_eq!(song.rank, 9);
        assert_eq!(song.artist, "Adele");
        assert_eq!(song.catalog_checked_at, None);
        assert_eq!(store.songs_needing_catalog(10).unwrap().len(), 1);

        let version: i64 = store
            .with_conn(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(version, (BASE_DB_VERSION + 2) as i64);
    }

    #[test]
    fn missing_enrichment_columns_are_added_on_demand() {
        let store = store_with_songs(&[new_song(1, "A", "X")]);
        store
            .with_conn(|conn| {
                conn.execute_batch("ALTER TABLE songs DROP COLUMN release_year")?;
                Ok(())
            })
            .unwrap();

        let added = store.ensure_enrichment_schema().unwrap();
        assert_eq!(added, vec!["release_year".to_string()]);
        assert_eq!(store.get_song(1).unwrap().unwrap().title, "A");
    }
}
