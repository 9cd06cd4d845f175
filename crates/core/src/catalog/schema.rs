use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Create all tables. Foreign-key columns are plain integers; referential
/// integrity is maintained by the catalog, not by SQLite.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cameras (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            make                TEXT NOT NULL,
            model               TEXT NOT NULL,
            serial_number       TEXT,
            min_shutter         TEXT,
            max_shutter         TEXT,
            shutter_increments  INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS lenses (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            make                TEXT NOT NULL,
            model               TEXT NOT NULL,
            serial_number       TEXT,
            min_aperture        TEXT,
            max_aperture        TEXT,
            min_focal_length    INTEGER NOT NULL DEFAULT 0,
            max_focal_length    INTEGER NOT NULL DEFAULT 0,
            aperture_increments INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS filters (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            make        TEXT NOT NULL,
            model       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS camera_lenses (
            camera_id   INTEGER NOT NULL,
            lens_id     INTEGER NOT NULL,
            PRIMARY KEY (camera_id, lens_id)
        );

        CREATE INDEX IF NOT EXISTS idx_camera_lenses_lens ON camera_lenses(lens_id);

        CREATE TABLE IF NOT EXISTS filter_lenses (
            filter_id   INTEGER NOT NULL,
            lens_id     INTEGER NOT NULL,
            PRIMARY KEY (filter_id, lens_id)
        );

        CREATE INDEX IF NOT EXISTS idx_filter_lenses_lens ON filter_lenses(lens_id);

        CREATE TABLE IF NOT EXISTS rolls (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            date        TEXT,
            note        TEXT,
            camera_id   INTEGER,
            iso         INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_rolls_camera ON rolls(camera_id);

        CREATE TABLE IF NOT EXISTS frames (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            roll_id             INTEGER NOT NULL,
            count               INTEGER NOT NULL,
            date                TEXT,
            shutter             TEXT,
            aperture            TEXT,
            note                TEXT,
            location            TEXT,
            formatted_address   TEXT,
            focal_length        INTEGER NOT NULL DEFAULT 0,
            exposure_comp       TEXT,
            lens_id             INTEGER,
            filter_id           INTEGER,
            picture_filename    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_frames_roll ON frames(roll_id);
        CREATE INDEX IF NOT EXISTS idx_frames_lens ON frames(lens_id);
        CREATE INDEX IF NOT EXISTS idx_frames_filter ON frames(filter_id);
        CREATE INDEX IF NOT EXISTS idx_frames_picture ON frames(picture_filename);

        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Record the schema version on a fresh catalog and refuse catalogs written
/// by a newer build.
pub fn migrate(conn: &Connection) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let version = match stored {
        Some(v) => v.parse::<u32>().unwrap_or(0),
        None => 0,
    };

    if version > SCHEMA_VERSION {
        return Err(Error::SchemaTooNew {
            db: version,
            code: SCHEMA_VERSION,
        });
    }

    if version < SCHEMA_VERSION {
        log::info!("Upgrading catalog schema from v{version} to v{SCHEMA_VERSION}");
        conn.execute(
            "INSERT INTO config (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![SCHEMA_VERSION.to_string()],
        )?;
    }

    Ok(())
}
