pub mod mounts;
pub mod schema;

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::*;
use crate::error::{Error, Result};

/// SQLite-backed catalog for gear, mount relations, rolls and frames.
pub struct Catalog {
    conn: Connection,
}

const CAMERA_COLUMNS: &str =
    "id, make, model, serial_number, min_shutter, max_shutter, shutter_increments";
const LENS_COLUMNS: &str = "id, make, model, serial_number, min_aperture, max_aperture,
     min_focal_length, max_focal_length, aperture_increments";
const FILTER_COLUMNS: &str = "id, make, model";
const ROLL_COLUMNS: &str = "id, name, date, note, camera_id, iso";
const FRAME_COLUMNS: &str = "id, roll_id, count, date, shutter, aperture, note, location,
     formatted_address, focal_length, exposure_comp, lens_id, filter_id, picture_filename";

/// Ordering shared by every gear listing.
pub(crate) const GEAR_ORDER: &str = "ORDER BY make COLLATE NOCASE, model COLLATE NOCASE, id";

impl Catalog {
    /// Open or create a catalog at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        log::info!("Opened catalog at {}", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ── Gear ─────────────────────────────────────────────────────────

    /// Insert a camera, lens or filter and return its generated id.
    /// The id carried by `gear` is ignored.
    pub fn add_gear(&self, gear: &Gear) -> Result<i64> {
        gear.validate()?;
        match gear {
            Gear::Camera(c) => {
                self.conn.execute(
                    "INSERT INTO cameras (make, model, serial_number, min_shutter, max_shutter, shutter_increments)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        c.make,
                        c.model,
                        c.serial_number,
                        c.min_shutter,
                        c.max_shutter,
                        c.shutter_increments.as_i64(),
                    ],
                )?;
            }
            Gear::Lens(l) => {
                self.conn.execute(
                    "INSERT INTO lenses (make, model, serial_number, min_aperture, max_aperture,
                     min_focal_length, max_focal_length, aperture_increments)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        l.make,
                        l.model,
                        l.serial_number,
                        l.min_aperture,
                        l.max_aperture,
                        l.min_focal_length,
                        l.max_focal_length,
                        l.aperture_increments.as_i64(),
                    ],
                )?;
            }
            Gear::Filter(f) => {
                self.conn.execute(
                    "INSERT INTO filters (make, model) VALUES (?1, ?2)",
                    params![f.make, f.model],
                )?;
            }
        }
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_gear(&self, gear: &Gear) -> Result<()> {
        gear.validate()?;
        let changed = match gear {
            Gear::Camera(c) => self.conn.execute(
                "UPDATE cameras SET make=?1, model=?2, serial_number=?3, min_shutter=?4,
                 max_shutter=?5, shutter_increments=?6 WHERE id=?7",
                params![
                    c.make,
                    c.model,
                    c.serial_number,
                    c.min_shutter,
                    c.max_shutter,
                    c.shutter_increments.as_i64(),
                    c.id,
                ],
            )?,
            Gear::Lens(l) => self.conn.execute(
                "UPDATE lenses SET make=?1, model=?2, serial_number=?3, min_aperture=?4,
                 max_aperture=?5, min_focal_length=?6, max_focal_length=?7, aperture_increments=?8
                 WHERE id=?9",
                params![
                    l.make,
                    l.model,
                    l.serial_number,
                    l.min_aperture,
                    l.max_aperture,
                    l.min_focal_length,
                    l.max_focal_length,
                    l.aperture_increments.as_i64(),
                    l.id,
                ],
            )?,
            Gear::Filter(f) => self.conn.execute(
                "UPDATE filters SET make=?1, model=?2 WHERE id=?3",
                params![f.make, f.model, f.id],
            )?,
        };
        if changed == 0 {
            return Err(Error::GearNotFound(gear.key()));
        }
        Ok(())
    }

    pub fn get_camera(&self, id: i64) -> Result<Option<Camera>> {
        let camera = self
            .conn
            .query_row(
                &format!("SELECT {CAMERA_COLUMNS} FROM cameras WHERE id = ?1"),
                params![id],
                camera_from_row,
            )
            .optional()?;
        Ok(camera)
    }

    pub fn get_lens(&self, id: i64) -> Result<Option<Lens>> {
        let lens = self
            .conn
            .query_row(
                &format!("SELECT {LENS_COLUMNS} FROM lenses WHERE id = ?1"),
                params![id],
                lens_from_row,
            )
            .optional()?;
        Ok(lens)
    }

    pub fn get_filter(&self, id: i64) -> Result<Option<Filter>> {
        let filter = self
            .conn
            .query_row(
                &format!("SELECT {FILTER_COLUMNS} FROM filters WHERE id = ?1"),
                params![id],
                filter_from_row,
            )
            .optional()?;
        Ok(filter)
    }

    pub fn get_gear(&self, key: GearKey) -> Result<Option<Gear>> {
        Ok(match key.kind {
            GearKind::Camera => self.get_camera(key.id)?.map(Gear::Camera),
            GearKind::Lens => self.get_lens(key.id)?.map(Gear::Lens),
            GearKind::Filter => self.get_filter(key.id)?.map(Gear::Filter),
        })
    }

    pub fn gear_exists(&self, key: GearKey) -> Result<bool> {
        let exists = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", gear_table(key.kind)),
            params![key.id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn list_cameras(&self) -> Result<Vec<Camera>> {
        self.query_cameras(&format!("SELECT {CAMERA_COLUMNS} FROM cameras {GEAR_ORDER}"), [])
    }

    pub fn list_lenses(&self) -> Result<Vec<Lens>> {
        self.query_lenses(&format!("SELECT {LENS_COLUMNS} FROM lenses {GEAR_ORDER}"), [])
    }

    pub fn list_filters(&self) -> Result<Vec<Filter>> {
        self.query_filters(&format!("SELECT {FILTER_COLUMNS} FROM filters {GEAR_ORDER}"), [])
    }

    pub fn list_gear(&self, kind: GearKind) -> Result<Vec<Gear>> {
        Ok(match kind {
            GearKind::Camera => self.list_cameras()?.into_iter().map(Gear::Camera).collect(),
            GearKind::Lens => self.list_lenses()?.into_iter().map(Gear::Lens).collect(),
            GearKind::Filter => self.list_filters()?.into_iter().map(Gear::Filter).collect(),
        })
    }

    /// A camera is in use while a roll references it; lenses and filters
    /// while a frame references them.
    pub fn is_gear_in_use(&self, key: GearKey) -> Result<bool> {
        gear_in_use(&self.conn, key)
    }

    /// Delete gear together with all of its mount relations.
    /// Fails with `GearInUse` (and changes nothing) while the gear is referenced.
    /// Returns false when no such gear exists.
    pub fn delete_gear(&mut self, key: GearKey) -> Result<bool> {
        let tx = self.conn.transaction()?;
        if gear_in_use(&tx, key)? {
            return Err(Error::GearInUse(key));
        }
        let mounts_removed = mounts::cascade_delete(&tx, key)?;
        let deleted = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", gear_table(key.kind)),
            params![key.id],
        )?;
        tx.commit()?;

        if deleted > 0 {
            log::info!("Deleted {key} and {mounts_removed} mount relation(s)");
        }
        Ok(deleted > 0)
    }

    pub(crate) fn query_cameras<P: rusqlite::Params>(&self, sql: &str, p: P) -> Result<Vec<Camera>> {
        let mut stmt = self.conn.prepare(sql)?;
        let cameras = stmt
            .query_map(p, camera_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cameras)
    }

    pub(crate) fn query_lenses<P: rusqlite::Params>(&self, sql: &str, p: P) -> Result<Vec<Lens>> {
        let mut stmt = self.conn.prepare(sql)?;
        let lenses = stmt
            .query_map(p, lens_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lenses)
    }

    pub(crate) fn query_filters<P: rusqlite::Params>(&self, sql: &str, p: P) -> Result<Vec<Filter>> {
        let mut stmt = self.conn.prepare(sql)?;
        let filters = stmt
            .query_map(p, filter_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(filters)
    }

    // ── Rolls ────────────────────────────────────────────────────────

    pub fn add_roll(&self, roll: &Roll) -> Result<i64> {
        roll.validate()?;
        self.conn.execute(
            "INSERT INTO rolls (name, date, note, camera_id, iso) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                roll.name,
                format_date(roll.date),
                roll.note,
                roll.camera_id,
                roll.iso,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_roll(&self, roll: &Roll) -> Result<()> {
        roll.validate()?;
        let changed = self.conn.execute(
            "UPDATE rolls SET name=?1, date=?2, note=?3, camera_id=?4, iso=?5 WHERE id=?6",
            params![
                roll.name,
                format_date(roll.date),
                roll.note,
                roll.camera_id,
                roll.iso,
                roll.id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::RollNotFound(roll.id));
        }
        Ok(())
    }

    pub fn get_roll(&self, id: i64) -> Result<Option<Roll>> {
        let roll = self
            .conn
            .query_row(
                &format!("SELECT {ROLL_COLUMNS} FROM rolls WHERE id = ?1"),
                params![id],
                roll_from_row,
            )
            .optional()?;
        Ok(roll)
    }

    /// All rolls, newest first; undated rolls last.
    pub fn list_rolls(&self) -> Result<Vec<Roll>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROLL_COLUMNS} FROM rolls ORDER BY date IS NULL, date DESC, id"
        ))?;
        let rolls = stmt
            .query_map([], roll_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rolls)
    }

    /// Delete a roll and all of its frames. Returns the number of frames removed.
    /// Pictures attached to those frames become orphans.
    pub fn delete_roll(&mut self, id: i64) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let frames_removed = tx.execute("DELETE FROM frames WHERE roll_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM rolls WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(Error::RollNotFound(id));
        }
        tx.commit()?;
        log::info!("Deleted roll #{id} with {frames_removed} frame(s)");
        Ok(frames_removed)
    }

    pub fn frame_count(&self, roll_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frames WHERE roll_id = ?1",
            params![roll_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ── Frames ───────────────────────────────────────────────────────

    pub fn add_frame(&self, frame: &Frame) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO frames (roll_id, count, date, shutter, aperture, note, location,
             formatted_address, focal_length, exposure_comp, lens_id, filter_id, picture_filename)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            params![
                frame.roll_id,
                frame.count,
                format_date(frame.date),
                frame.shutter,
                frame.aperture,
                frame.note,
                frame.location.map(|l| l.to_string()),
                frame.formatted_address,
                frame.focal_length,
                frame.exposure_comp,
                frame.lens_id,
                frame.filter_id,
                frame.picture_filename,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_frame(&self, frame: &Frame) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE frames SET roll_id=?1, count=?2, date=?3, shutter=?4, aperture=?5, note=?6,
             location=?7, formatted_address=?8, focal_length=?9, exposure_comp=?10, lens_id=?11,
             filter_id=?12, picture_filename=?13
             WHERE id=?14",
            params![
                frame.roll_id,
                frame.count,
                format_date(frame.date),
                frame.shutter,
                frame.aperture,
                frame.note,
                frame.location.map(|l| l.to_string()),
                frame.formatted_address,
                frame.focal_length,
                frame.exposure_comp,
                frame.lens_id,
                frame.filter_id,
                frame.picture_filename,
                frame.id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::FrameNotFound(frame.id));
        }
        Ok(())
    }

    pub fn get_frame(&self, id: i64) -> Result<Option<Frame>> {
        let frame = self
            .conn
            .query_row(
                &format!("SELECT {FRAME_COLUMNS} FROM frames WHERE id = ?1"),
                params![id],
                frame_from_row,
            )
            .optional()?;
        Ok(frame)
    }

    /// Frames of a roll ordered by frame count.
    pub fn list_frames(&self, roll_id: i64) -> Result<Vec<Frame>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FRAME_COLUMNS} FROM frames WHERE roll_id = ?1 ORDER BY count, id"
        ))?;
        let frames = stmt
            .query_map(params![roll_id], frame_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(frames)
    }

    pub fn delete_frame(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM frames WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(Error::FrameNotFound(id));
        }
        Ok(())
    }

    /// Link (or with `None`, unlink) a complementary picture to a frame.
    pub fn set_frame_picture(&self, frame_id: i64, filename: Option<&str>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE frames SET picture_filename = ?1 WHERE id = ?2",
            params![filename, frame_id],
        )?;
        if changed == 0 {
            return Err(Error::FrameNotFound(frame_id));
        }
        Ok(())
    }

    /// The frame currently referencing a picture file, if any.
    pub fn frame_for_picture(&self, filename: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM frames WHERE picture_filename = ?1 ORDER BY id LIMIT 1",
                params![filename],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Every picture filename referenced by any frame.
    pub fn complementary_picture_filenames(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT picture_filename FROM frames
             WHERE picture_filename IS NOT NULL AND picture_filename != ''",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    // ── Config ───────────────────────────────────────────────────────

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

pub(crate) fn gear_table(kind: GearKind) -> &'static str {
    match kind {
        GearKind::Camera => "cameras",
        GearKind::Lens => "lenses",
        GearKind::Filter => "filters",
    }
}

fn gear_in_use(conn: &Connection, key: GearKey) -> Result<bool> {
    let sql = match key.kind {
        GearKind::Camera => "SELECT EXISTS(SELECT 1 FROM rolls WHERE camera_id = ?1)",
        GearKind::Lens => "SELECT EXISTS(SELECT 1 FROM frames WHERE lens_id = ?1)",
        GearKind::Filter => "SELECT EXISTS(SELECT 1 FROM frames WHERE filter_id = ?1)",
    };
    let in_use = conn.query_row(sql, params![key.id], |row| row.get(0))?;
    Ok(in_use)
}

fn format_date(date: Option<NaiveDateTime>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

/// Unparsable stored dates read back as absent.
fn parse_date(value: Option<String>) -> Option<NaiveDateTime> {
    value.and_then(|s| NaiveDateTime::parse_from_str(&s, DATE_FORMAT).ok())
}

fn camera_from_row(row: &Row) -> rusqlite::Result<Camera> {
    Ok(Camera {
        id: row.get(0)?,
        make: row.get(1)?,
        model: row.get(2)?,
        serial_number: row.get(3)?,
        min_shutter: row.get(4)?,
        max_shutter: row.get(5)?,
        shutter_increments: Increment::from_i64(row.get(6)?),
    })
}

fn lens_from_row(row: &Row) -> rusqlite::Result<Lens> {
    Ok(Lens {
        id: row.get(0)?,
        make: row.get(1)?,
        model: row.get(2)?,
        serial_number: row.get(3)?,
        min_aperture: row.get(4)?,
        max_aperture: row.get(5)?,
        min_focal_length: row.get(6)?,
        max_focal_length: row.get(7)?,
        aperture_increments: Increment::from_i64(row.get(8)?),
    })
}

fn filter_from_row(row: &Row) -> rusqlite::Result<Filter> {
    Ok(Filter {
        id: row.get(0)?,
        make: row.get(1)?,
        model: row.get(2)?,
    })
}

fn roll_from_row(row: &Row) -> rusqlite::Result<Roll> {
    Ok(Roll {
        id: row.get(0)?,
        name: row.get(1)?,
        date: parse_date(row.get(2)?),
        note: row.get(3)?,
        camera_id: row.get(4)?,
        iso: row.get(5)?,
    })
}

fn frame_from_row(row: &Row) -> rusqlite::Result<Frame> {
    Ok(Frame {
        id: row.get(0)?,
        roll_id: row.get(1)?,
        count: row.get(2)?,
        date: parse_date(row.get(3)?),
        shutter: row.get(4)?,
        aperture: row.get(5)?,
        note: row.get(6)?,
        location: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| Location::parse(&s)),
        formatted_address: row.get(8)?,
        focal_length: row.get(9)?,
        exposure_comp: row.get(10)?,
        lens_id: row.get(11)?,
        filter_id: row.get(12)?,
        picture_filename: row.get(13)?,
    })
}
