//! SQLite schema definitions for the chart database.
//!
//! Songs are keyed by an integer rowid and identified by `(title, artist_id)`.
//! Catalog enrichment columns were added to `songs` after the first
//! release, so they are all nullable and added in place on older files.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};
use anyhow::Result;
use rusqlite::Connection;

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "artist_id",
    on_delete: ForeignKeyOnChange::Restrict,
};

const ALBUM_FK: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "album_id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "song_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Version 0 - chart rows only
// =============================================================================

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

const SONGS_TABLE_V0: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("song_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("rank", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
    ],
    indices: &[("idx_songs_artist", "artist_id")],
    unique_constraints: &[&["title", "artist_id"]],
};

// =============================================================================
// Version 1 - catalog enrichment
// =============================================================================

/// Albums resolved from the external catalog, one row per catalog album id.
pub(super) const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("album_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("catalog_album_id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[&["catalog_album_id"]],
};

pub(super) const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("song_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("rank", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("catalog_track_id", &SqlType::Text),
        sqlite_column!("popularity", &SqlType::Integer),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("explicit", &SqlType::Integer), // 0/1
        sqlite_column!("album_id", &SqlType::Integer, foreign_key = Some(&ALBUM_FK)),
        sqlite_column!("release_year", &SqlType::Integer),
        // Set once the catalog lookup ran, match or not
        sqlite_column!("catalog_checked_at", &SqlType::Integer),
    ],
    indices: &[
        ("idx_songs_artist", "artist_id"),
        ("idx_songs_catalog_checked", "catalog_checked_at"),
    ],
    unique_constraints: &[&["title", "artist_id"]],
};

fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    ALBUMS_TABLE.create_if_missing(conn)?;
    SONGS_TABLE.add_missing_columns(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_songs_catalog_checked ON songs(catalog_checked_at)",
        [],
    )?;
    Ok(())
}

// =============================================================================
// Version 2 - listening statistics
// =============================================================================

const TRACK_STATS_TABLE: Table = Table {
    name: "track_stats",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("listeners", &SqlType::Integer, non_null = true),
        sqlite_column!("playcount", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_track_stats_artist", "artist_id")],
    unique_constraints: &[],
};

fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    TRACK_STATS_TABLE.create_if_missing(conn)?;
    Ok(())
}

pub const CHART_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[ARTISTS_TABLE, SONGS_TABLE_V0],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[ARTISTS_TABLE, ALBUMS_TABLE, SONGS_TABLE],
        migration: Some(migrate_v0_to_v1),
    },
    VersionedSchema {
        version: 2,
        tables: &[ARTISTS_TABLE, ALBUMS_TABLE, SONGS_TABLE, TRACK_STATS_TABLE],
        migration: Some(migrate_v1_to_v2),
    },
];
