use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use tracing::info;

pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Optional fields are assigned after construction, so mut is unused when none are given
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn from_sql(declared: &str) -> Option<&'static SqlType> {
        match declared.to_ascii_uppercase().as_str() {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            _ => None,
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    Cascade,
}

impl ForeignKeyOnChange {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Restrict => "RESTRICT",
            ForeignKeyOnChange::SetNull => "SET NULL",
            ForeignKeyOnChange::Cascade => "CASCADE",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

impl Column {
    /// Column definition as it appears inside `CREATE TABLE` or `ADD COLUMN`.
    fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if self.is_unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default_value) = self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default_value));
        }
        if let Some(foreign_key) = self.foreign_key {
            sql.push_str(&format!(
                " REFERENCES {}({}) ON DELETE {}",
                foreign_key.foreign_table,
                foreign_key.foreign_column,
                foreign_key.on_delete.as_sql()
            ));
        }
        sql
    }

    /// SQLite refuses `ADD COLUMN` for PRIMARY KEY / UNIQUE columns and for
    /// NOT NULL columns without a default.
    fn can_be_added_later(&self) -> bool {
        !self.is_primary_key
            && !self.is_unique
            && (!self.non_null || self.default_value.is_some())
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut parts: Vec<String> = self.columns.iter().map(Column::definition).collect();
        for unique_constraint in self.unique_constraints {
            parts.push(format!("UNIQUE ({})", unique_constraint.join(", ")));
        }
        let create_sql = format!("CREATE TABLE {} ({});", self.name, parts.join(", "));
        conn.execute(&create_sql, params![])
            .with_context(|| format!("Failed to create table {}", self.name))?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }

    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            params![self.name],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn create_if_missing(&self, conn: &Connection) -> Result<bool> {
        if self.exists(conn)? {
            return Ok(false);
        }
        self.create(conn)?;
        Ok(true)
    }

    fn existing_column_names(&self, conn: &Connection) -> Result<HashSet<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let names = stmt
            .query_map(params![], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    /// Adds every declared column the live table lacks. Existing rows keep
    /// their values and the new columns read as NULL (or their default).
    pub fn add_missing_columns(&self, conn: &Connection) -> Result<Vec<&'static str>> {
        let existing = self.existing_column_names(conn)?;
        let mut added = Vec::new();
        for column in self.columns {
            if existing.contains(column.name) {
                continue;
            }
            if !column.can_be_added_later() {
                bail!(
                    "Table {} is missing column {} which cannot be added in place",
                    self.name,
                    column.name
                );
            }
            info!("Adding column {} to table {}", column.name, self.name);
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {}", self.name, column.definition()),
                params![],
            )
            .with_context(|| format!("Failed to add column {}.{}", self.name, column.name))?;
            added.push(column.name);
        }
        Ok(added)
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        if !self.exists(conn)? {
            bail!("Table {} does not exist", self.name);
        }

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String)> = stmt
            .query_map(params![], |row| Ok((row.get(1)?, row.get(2)?)))?
            .collect::<Result<_, _>>()?;

        for expected in self.columns {
            let Some((_, declared)) = actual.iter().find(|(name, _)| name == expected.name) else {
                bail!("Table {} is missing column {}", self.name, expected.name);
            };
            if SqlType::from_sql(declared) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    declared
                );
            }
        }

        if self.unique_constraints.is_empty() {
            return Ok(());
        }

        // Composite UNIQUE constraints show up as auto-indices with unique=1
        let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", self.name))?;
        let unique_indices: Vec<String> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i32>(2)?)))?
            .filter_map(|r| r.ok())
            .filter(|(_, unique)| *unique == 1)
            .map(|(name, _)| name)
            .collect();

        let mut unique_column_sets: Vec<Vec<String>> = Vec::with_capacity(unique_indices.len());
        for index_name in &unique_indices {
            let mut idx_stmt = conn.prepare(&format!("PRAGMA index_info({})", index_name))?;
            let mut cols: Vec<String> = idx_stmt
                .query_map([], |row| row.get::<_, String>(2))?
                .filter_map(|r| r.ok())
                .collect();
            cols.sort();
            unique_column_sets.push(cols);
        }

        for expected in self.unique_constraints {
            let mut wanted: Vec<&str> = expected.to_vec();
            wanted.sort_unstable();
            let found = unique_column_sets
                .iter()
                .any(|cols| cols.iter().map(String::as_str).eq(wanted.iter().copied()));
            if !found {
                bail!(
                    "Table {} is missing unique constraint on columns ({})",
                    self.name,
                    expected.join(", ")
                );
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.pragma_update(None, "user_version", BASE_DB_VERSION + self.version)?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Brings `conn` up to the last schema in `schemas`.
///
/// A database with no tables gets the latest schema directly. A database
/// whose `user_version` predates [`BASE_DB_VERSION`] was written by
/// un-versioned tooling and is treated as version 0.
pub fn migrate_if_needed(conn: &mut Connection, schemas: &[VersionedSchema]) -> Result<()> {
    let Some(latest_schema) = schemas.last() else {
        bail!("No schema versions defined");
    };
    let latest_version = latest_schema.version;

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!("Creating chart db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        info!("Found un-versioned chart db, treating it as version 0");
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version > latest_version {
        bail!(
            "Chart db version {} is newer than the latest known version {}",
            current_version,
            latest_version
        );
    }
    if current_version == latest_version && db_version >= BASE_DB_VERSION as i64 {
        return Ok(());
    }

    let tx = conn.transaction()?;
    if current_version == 0 {
        // Legacy files may be missing any of the v0 tables
        for table in schemas[0].tables {
            table.create_if_missing(&tx)?;
        }
    }
    let start_version = current_version;
    for schema in schemas.iter().filter(|s| s.version > start_version) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating chart db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
        }
        current_version = schema.version;
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT_FK: ForeignKey = ForeignKey {
        foreign_table: "parent",
        foreign_column: "id",
        on_delete: ForeignKeyOnChange::Cascade,
    };

    const PARENT_TABLE: Table = Table {
        name: "parent",
        columns: &[sqlite_column!("id", &SqlType::Integer, is_primary_key = true)],
        indices: &[],
        unique_constraints: &[],
    };

    const CHILD_TABLE_V0: Table = Table {
        name: "child",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("label", &SqlType::Text, non_null = true),
            sqlite_column!(
                "parent_id",
                &SqlType::Integer,
                non_null = true,
                foreign_key = Some(&PARENT_FK)
            ),
        ],
        indices: &[("idx_child_parent", "parent_id")],
        unique_constraints: &[&["label", "parent_id"]],
    };

    const CHILD_TABLE_V1: Table = Table {
        name: "child",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("label", &SqlType::Text, non_null = true),
            sqlite_column!(
                "parent_id",
                &SqlType::Integer,
                non_null = true,
                foreign_key = Some(&PARENT_FK)
            ),
            sqlite_column!("score", &SqlType::Integer),
            sqlite_column!("note", &SqlType::Text),
        ],
        indices: &[("idx_child_parent", "parent_id")],
        unique_constraints: &[&["label", "parent_id"]],
    };

    fn migrate_child_to_v1(conn: &Connection) -> Result<()> {
        CHILD_TABLE_V1.add_missing_columns(conn)?;
        Ok(())
    }

    const TEST_SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 0,
            tables: &[PARENT_TABLE, CHILD_TABLE_V0],
            migration: None,
        },
        VersionedSchema {
            version: 1,
            tables: &[PARENT_TABLE, CHILD_TABLE_V1],
            migration: Some(migrate_child_to_v1),
        },
    ];

    fn user_version(conn: &Connection) -> i64 {
        conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn create_emits_constraints_and_indices() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMAS[0].create(&conn).unwrap();

        TEST_SCHEMAS[0].validate(&conn).unwrap();
        let index_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_child_parent'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);

        conn.execute("INSERT INTO parent (id) VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO child (label, parent_id) VALUES ('a', 1)", [])
            .unwrap();
        let duplicate = conn.execute("INSERT INTO child (label, parent_id) VALUES ('a', 1)", []);
        assert!(duplicate.is_err());
        let orphan = conn.execute("INSERT INTO child (label, parent_id) VALUES ('b', 42)", []);
        assert!(orphan.is_err());
    }

    #[test]
    fn add_missing_columns_keeps_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMAS[0].create(&conn).unwrap();
        conn.execute("INSERT INTO parent (id) VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO child (label, parent_id) VALUES ('kept', 1)", [])
            .unwrap();

        let added = CHILD_TABLE_V1.add_missing_columns(&conn).unwrap();
        assert_eq!(added, vec!["score", "note"]);

        let (label, score): (String, Option<i64>) = conn
            .query_row("SELECT label, score FROM child", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(label, "kept");
        assert_eq!(score, None);

        // Second pass is a no-op
        assert!(CHILD_TABLE_V1.add_missing_columns(&conn).unwrap().is_empty());
    }

    #[test]
    fn add_missing_columns_rejects_unique_column() {
        const WITH_UNIQUE: Table = Table {
            name: "parent",
            columns: &[
                sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
                sqlite_column!("code", &SqlType::Text, is_unique = true),
            ],
            indices: &[],
            unique_constraints: &[],
        };
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();

        let err = WITH_UNIQUE.add_missing_columns(&conn).unwrap_err();
        assert!(err.to_string().contains("cannot be added in place"));
    }

    #[test]
    fn validate_detects_missing_column_and_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, label TEXT NOT NULL, parent_id INTEGER NOT NULL)",
            [],
        )
        .unwrap();

        let err = TEST_SCHEMAS[0].validate(&conn).unwrap_err();
        assert!(err.to_string().contains("missing unique constraint"));

        let err = TEST_SCHEMAS[1].validate(&conn).unwrap_err();
        assert!(err.to_string().contains("missing column score"));
    }

    #[test]
    fn migrate_creates_latest_on_empty_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_if_needed(&mut conn, TEST_SCHEMAS).unwrap();

        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 1) as i64);
        TEST_SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn migrate_upgrades_versioned_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMAS[0].create(&conn).unwrap();
        assert_eq!(user_version(&conn), BASE_DB_VERSION as i64);

        migrate_if_needed(&mut conn, TEST_SCHEMAS).unwrap();
        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 1) as i64);
        TEST_SCHEMAS[1].validate(&conn).unwrap();
    }

    const AUDIT_TABLE: Table = Table {
        name: "audit",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("event", &SqlType::Text, non_null = true),
        ],
        indices: &[],
        unique_constraints: &[],
    };

    fn migrate_add_audit(conn: &Connection) -> Result<()> {
        AUDIT_TABLE.create_if_missing(conn)?;
        Ok(())
    }

    const THREE_VERSIONS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 0,
            tables: &[PARENT_TABLE, CHILD_TABLE_V0],
            migration: None,
        },
        VersionedSchema {
            version: 1,
            tables: &[PARENT_TABLE, CHILD_TABLE_V1],
            migration: Some(migrate_child_to_v1),
        },
        VersionedSchema {
            version: 2,
            tables: &[PARENT_TABLE, CHILD_TABLE_V1, AUDIT_TABLE],
            migration: Some(migrate_add_audit),
        },
    ];

    #[test]
    fn migrate_runs_every_pending_step() {
        let mut conn = Connection::open_in_memory().unwrap();
        THREE_VERSIONS[0].create(&conn).unwrap();
        conn.execute("INSERT INTO parent (id) VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO child (label, parent_id) VALUES ('v0', 1)", [])
            .unwrap();

        migrate_if_needed(&mut conn, THREE_VERSIONS).unwrap();

        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 2) as i64);
        THREE_VERSIONS[2].validate(&conn).unwrap();
        let (label, score): (String, Option<i64>) = conn
            .query_row("SELECT label, score FROM child", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(label, "v0");
        assert_eq!(score, None);

        // Starting from v1 only the last step runs
        let mut conn = Connection::open_in_memory().unwrap();
        THREE_VERSIONS[1].create(&conn).unwrap();
        migrate_if_needed(&mut conn, THREE_VERSIONS).unwrap();
        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 2) as i64);
        THREE_VERSIONS[2].validate(&conn).unwrap();
    }

    #[test]
    fn migrate_adopts_unversioned_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        // Only the child table, no user_version
        conn.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, label TEXT NOT NULL, parent_id INTEGER NOT NULL, UNIQUE(label, parent_id))",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO parent (id) VALUES (7)", []).unwrap();
        conn.execute("INSERT INTO child (label, parent_id) VALUES ('old', 7)", [])
            .unwrap();

        migrate_if_needed(&mut conn, TEST_SCHEMAS).unwrap();

        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 1) as i64);
        let label: String = conn
            .query_row("SELECT label FROM child WHERE parent_id = 7", [], |r| r.get(0))
            .unwrap();
        assert_eq!(label, "old");
    }

    #[test]
    fn migrate_rejects_newer_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMAS[1].create(&conn).unwrap();
        conn.pragma_update(None, "user_version", BASE_DB_VERSION + 5)
            .unwrap();

        let err = migrate_if_needed(&mut conn, TEST_SCHEMAS).unwrap_err();
        assert!(err.to_string().contains("newer"));
    }
}
