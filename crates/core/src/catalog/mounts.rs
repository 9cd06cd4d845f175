//! Mount relations between gear: Camera↔Lens and Filter↔Lens.
//!
//! Each relation lives in exactly one association table, keyed by the
//! unordered pair, so membership queried from either side is the same set.

use std::collections::BTreeSet;

use rusqlite::{params, Connection};

use super::{gear_table, Catalog, GEAR_ORDER};
use crate::domain::*;
use crate::error::{Error, Result};

/// A mount relation normalized to its association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MountEdge {
    table: &'static str,
    gear_column: &'static str,
    gear: GearKey,
    lens_id: i64,
}

impl MountEdge {
    fn between(a: GearKey, b: GearKey) -> Result<Self> {
        let (other, lens) = match (a.kind, b.kind) {
            (GearKind::Lens, GearKind::Camera | GearKind::Filter) => (b, a),
            (GearKind::Camera | GearKind::Filter, GearKind::Lens) => (a, b),
            _ => return Err(Error::NotMountable { a, b }),
        };
        let (table, gear_column) = match other.kind {
            GearKind::Camera => ("camera_lenses", "camera_id"),
            _ => ("filter_lenses", "filter_id"),
        };
        Ok(Self {
            table,
            gear_column,
            gear: other,
            lens_id: lens.id,
        })
    }

    /// Insert the pair when absent and both rows exist. Returns true when a row was added.
    fn insert(&self, conn: &Connection) -> Result<bool> {
        let sql = format!(
            "INSERT OR IGNORE INTO {table} ({col}, lens_id)
             SELECT ?1, ?2
             WHERE EXISTS(SELECT 1 FROM {gear_table} WHERE id = ?1)
               AND EXISTS(SELECT 1 FROM lenses WHERE id = ?2)",
            table = self.table,
            col = self.gear_column,
            gear_table = gear_table(self.gear.kind),
        );
        let inserted = conn.execute(&sql, params![self.gear.id, self.lens_id])?;
        Ok(inserted > 0)
    }

    fn delete(&self, conn: &Connection) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1 AND lens_id = ?2",
            self.table, self.gear_column
        );
        let deleted = conn.execute(&sql, params![self.gear.id, self.lens_id])?;
        Ok(deleted > 0)
    }

    fn exists(&self, conn: &Connection) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND lens_id = ?2)",
            self.table, self.gear_column
        );
        let exists = conn.query_row(&sql, params![self.gear.id, self.lens_id], |row| row.get(0))?;
        Ok(exists)
    }
}

/// Remove every mount relation referencing `key`. Returns the number removed.
pub(crate) fn cascade_delete(conn: &Connection, key: GearKey) -> Result<usize> {
    let removed = match key.kind {
        GearKind::Camera => {
            conn.execute("DELETE FROM camera_lenses WHERE camera_id = ?1", params![key.id])?
        }
        GearKind::Filter => {
            conn.execute("DELETE FROM filter_lenses WHERE filter_id = ?1", params![key.id])?
        }
        GearKind::Lens => {
            conn.execute("DELETE FROM camera_lenses WHERE lens_id = ?1", params![key.id])?
                + conn.execute("DELETE FROM filter_lenses WHERE lens_id = ?1", params![key.id])?
        }
    };
    Ok(removed)
}

impl Catalog {
    // ── Mounts ───────────────────────────────────────────────────────

    /// Mount two pieces of gear to each other. Idempotent; a pair where either
    /// row no longer exists is silently skipped.
    pub fn add_mount(&self, a: GearKey, b: GearKey) -> Result<()> {
        let edge = MountEdge::between(a, b)?;
        if edge.insert(&self.conn)? {
            log::debug!("Mounted {a} to {b}");
        }
        Ok(())
    }

    pub fn remove_mount(&self, a: GearKey, b: GearKey) -> Result<()> {
        let edge = MountEdge::between(a, b)?;
        if edge.delete(&self.conn)? {
            log::debug!("Unmounted {a} from {b}");
        }
        Ok(())
    }

    pub fn is_mounted(&self, a: GearKey, b: GearKey) -> Result<bool> {
        MountEdge::between(a, b)?.exists(&self.conn)
    }

    /// Lenses mounted to a camera or a filter.
    pub fn mountable_lenses(&self, key: GearKey) -> Result<Vec<Lens>> {
        let (table, column) = match key.kind {
            GearKind::Camera => ("camera_lenses", "camera_id"),
            GearKind::Filter => ("filter_lenses", "filter_id"),
            GearKind::Lens => return Ok(Vec::new()),
        };
        self.query_lenses(
            &format!(
                "SELECT {cols} FROM lenses
                 WHERE id IN (SELECT lens_id FROM {table} WHERE {column} = ?1)
                 {GEAR_ORDER}",
                cols = super::LENS_COLUMNS,
            ),
            params![key.id],
        )
    }

    /// Cameras a lens is mounted to.
    pub fn mountable_cameras(&self, lens_id: i64) -> Result<Vec<Camera>> {
        self.query_cameras(
            &format!(
                "SELECT {cols} FROM cameras
                 WHERE id IN (SELECT camera_id FROM camera_lenses WHERE lens_id = ?1)
                 {GEAR_ORDER}",
                cols = super::CAMERA_COLUMNS,
            ),
            params![lens_id],
        )
    }

    /// Filters mounted to a lens.
    pub fn mountable_filters(&self, lens_id: i64) -> Result<Vec<Filter>> {
        self.query_filters(
            &format!(
                "SELECT {cols} FROM filters
                 WHERE id IN (SELECT filter_id FROM filter_lenses WHERE lens_id = ?1)
                 {GEAR_ORDER}",
                cols = super::FILTER_COLUMNS,
            ),
            params![lens_id],
        )
    }

    /// All gear mounted to `key`. For a lens, cameras come before filters.
    pub fn mountables_of(&self, key: GearKey) -> Result<Vec<Gear>> {
        let gear = match key.kind {
            GearKind::Camera | GearKind::Filter => self
                .mountable_lenses(key)?
                .into_iter()
                .map(Gear::Lens)
                .collect(),
            GearKind::Lens => {
                let mut gear: Vec<Gear> = self
                    .mountable_cameras(key.id)?
                    .into_iter()
                    .map(Gear::Camera)
                    .collect();
                gear.extend(self.mountable_filters(key.id)?.into_iter().map(Gear::Filter));
                gear
            }
        };
        Ok(gear)
    }

    /// Make `anchor`'s mounts among `candidates` match `desired`, in one transaction.
    ///
    /// Candidates not in `desired` are unmounted, desired candidates are mounted.
    /// Relations to gear outside `candidates` are left alone, and entries of
    /// `desired` that are not candidates are ignored.
    pub fn set_mount_state(
        &mut self,
        anchor: GearKey,
        candidates: &[GearKey],
        desired: &[GearKey],
    ) -> Result<MountChange> {
        let edges = candidates
            .iter()
            .map(|&c| Ok((c, MountEdge::between(anchor, c)?)))
            .collect::<Result<Vec<_>>>()?;

        let candidate_set: BTreeSet<GearKey> = candidates.iter().copied().collect();
        let desired_set: BTreeSet<GearKey> = desired
            .iter()
            .copied()
            .filter(|d| {
                let known = candidate_set.contains(d);
                if !known {
                    log::warn!("Ignoring {d}: not a mount candidate for {anchor}");
                }
                known
            })
            .collect();

        let tx = self.conn.transaction()?;
        let mut change = MountChange::default();
        for (candidate, edge) in &edges {
            let mounted = edge.exists(&tx)?;
            let wanted = desired_set.contains(candidate);
            if wanted && !mounted {
                if edge.insert(&tx)? {
                    change.added += 1;
                }
            } else if !wanted && mounted && edge.delete(&tx)? {
                change.removed += 1;
            }
        }
        tx.commit()?;

        log::info!(
            "Updated mounts of {anchor}: {} added, {} removed",
            change.added,
            change.removed
        );
        Ok(change)
    }

    /// Remove all mount relations of `key` without deleting the gear itself.
    pub fn cascade_delete_gear(&self, key: GearKey) -> Result<usize> {
        cascade_delete(&self.conn, key)
    }
}
