pub mod catalog;
pub mod domain;
pub mod error;
pub mod pictures;
pub mod sorting;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use catalog::Catalog;
use domain::*;
use error::{Error, Result};
use pictures::archive::ArchiveTask;
use pictures::{CompressOutcome, PictureStore, DEFAULT_MAX_DIMENSION};

const CATALOG_FILE: &str = "catalog.db";
const PICTURES_DIR: &str = "pictures";

/// The main entry point for the filmlog library.
///
/// Owns the catalog and the complementary picture directory and enforces the
/// rules that span both: gear in use cannot be deleted, frame gear must be
/// mounted together, and pictures are reclaimed only when no frame
/// references them.
pub struct Logbook {
    catalog: Catalog,
    pictures: PictureStore,
}

impl Logbook {
    /// Open or create a logbook in `data_dir` (`catalog.db` plus `pictures/`).
    pub fn open(data_dir: &Path) -> Result<Self> {
        let catalog = Catalog::open(&data_dir.join(CATALOG_FILE))?;
        let pictures = PictureStore::new(data_dir.join(PICTURES_DIR));
        Ok(Self { catalog, pictures })
    }

    /// In-memory catalog with pictures stored in `pictures_dir` (for testing).
    pub fn open_in_memory(pictures_dir: &Path) -> Result<Self> {
        Ok(Self {
            catalog: Catalog::open_in_memory()?,
            pictures: PictureStore::new(pictures_dir),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pictures(&self) -> &PictureStore {
        &self.pictures
    }

    // ── Gear ─────────────────────────────────────────────────────────

    /// Add gear and return it with its generated id.
    pub fn add_gear(&self, mut gear: Gear) -> Result<Gear> {
        let id = self.catalog.add_gear(&gear)?;
        gear.set_id(id);
        log::info!("Added {} ({})", gear.key(), gear.name());
        Ok(gear)
    }

    pub fn add_camera(&self, camera: Camera) -> Result<i64> {
        Ok(self.add_gear(Gear::Camera(camera))?.id())
    }

    pub fn add_lens(&self, lens: Lens) -> Result<i64> {
        Ok(self.add_gear(Gear::Lens(lens))?.id())
    }

    pub fn add_filter(&self, filter: Filter) -> Result<i64> {
        Ok(self.add_gear(Gear::Filter(filter))?.id())
    }

    pub fn update_gear(&self, gear: &Gear) -> Result<()> {
        self.catalog.update_gear(gear)
    }

    pub fn gear(&self, key: GearKey) -> Result<Gear> {
        self.catalog
            .get_gear(key)?
            .ok_or(Error::GearNotFound(key))
    }

    pub fn list_gear(&self, kind: GearKind) -> Result<Vec<Gear>> {
        self.catalog.list_gear(kind)
    }

    pub fn is_gear_in_use(&self, key: GearKey) -> Result<bool> {
        self.catalog.is_gear_in_use(key)
    }

    /// Delete gear and its mount relations. Fails with [`Error::GearInUse`]
    /// while a roll or frame references it.
    pub fn delete_gear(&mut self, key: GearKey) -> Result<bool> {
        self.catalog.delete_gear(key)
    }

    // ── Mounts ───────────────────────────────────────────────────────

    pub fn add_mount(&self, a: GearKey, b: GearKey) -> Result<()> {
        self.catalog.add_mount(a, b)
    }

    pub fn remove_mount(&self, a: GearKey, b: GearKey) -> Result<()> {
        self.catalog.remove_mount(a, b)
    }

    pub fn is_mounted(&self, a: GearKey, b: GearKey) -> Result<bool> {
        self.catalog.is_mounted(a, b)
    }

    pub fn mountables_of(&self, key: GearKey) -> Result<Vec<Gear>> {
        self.catalog.mountables_of(key)
    }

    /// Apply a selection of mounts for `anchor`, where the candidates are all
    /// gear of `kind`. Used by the "choose compatible gear" flow.
    pub fn set_mounts_of_kind(
        &mut self,
        anchor: GearKey,
        kind: GearKind,
        desired: &[i64],
    ) -> Result<MountChange> {
        if !anchor.kind.can_mount(kind) {
            return Err(Error::Validation(format!(
                "a {} cannot be mounted to a {kind}",
                anchor.kind
            )));
        }
        let candidates: Vec<GearKey> = self.catalog.list_gear(kind)?.iter().map(Gear::key).collect();
        let desired: Vec<GearKey> = desired.iter().map(|&id| GearKey { kind, id }).collect();
        self.catalog.set_mount_state(anchor, &candidates, &desired)
    }

    pub fn set_mount_state(
        &mut self,
        anchor: GearKey,
        candidates: &[GearKey],
        desired: &[GearKey],
    ) -> Result<MountChange> {
        self.catalog.set_mount_state(anchor, candidates, desired)
    }

    // ── Rolls ────────────────────────────────────────────────────────

    pub fn add_roll(&self, roll: &Roll) -> Result<i64> {
        self.validate_roll(roll)?;
        self.catalog.add_roll(roll)
    }

    pub fn update_roll(&self, roll: &Roll) -> Result<()> {
        self.validate_roll(roll)?;
        self.catalog.update_roll(roll)
    }

    pub fn roll(&self, id: i64) -> Result<Roll> {
        self.catalog.get_roll(id)?.ok_or(Error::RollNotFound(id))
    }

    pub fn list_rolls(&self) -> Result<Vec<Roll>> {
        self.catalog.list_rolls()
    }

    /// Delete a roll and its frames. Their pictures are left for
    /// [`reclaim_orphans`](Self::reclaim_orphans).
    pub fn delete_roll(&mut self, id: i64) -> Result<usize> {
        self.catalog.delete_roll(id)
    }

    pub fn frame_count(&self, roll_id: i64) -> Result<usize> {
        self.catalog.frame_count(roll_id)
    }

    fn validate_roll(&self, roll: &Roll) -> Result<()> {
        roll.validate()?;
        if let Some(camera_id) = roll.camera_id {
            if self.catalog.get_camera(camera_id)?.is_none() {
                return Err(Error::Validation(format!("camera #{camera_id} does not exist")));
            }
        }
        Ok(())
    }

    // ── Frames ───────────────────────────────────────────────────────

    pub fn add_frame(&self, frame: &Frame) -> Result<i64> {
        self.validate_frame(frame, None)?;
        self.catalog.add_frame(frame)
    }

    pub fn update_frame(&self, frame: &Frame) -> Result<()> {
        self.validate_frame(frame, Some(frame.id))?;
        self.catalog.update_frame(frame)
    }

    pub fn frame(&self, id: i64) -> Result<Frame> {
        self.catalog.get_frame(id)?.ok_or(Error::FrameNotFound(id))
    }

    pub fn list_frames(&self, roll_id: i64, sort: FrameSortMode) -> Result<Vec<Frame>> {
        let mut frames = self.catalog.list_frames(roll_id)?;
        let lens_names: HashMap<i64, String> = if sort == FrameSortMode::Lens {
            self.catalog
                .list_lenses()?
                .into_iter()
                .map(|l| (l.id, format!("{} {}", l.make, l.model)))
                .collect()
        } else {
            HashMap::new()
        };
        sorting::sort_frames(&mut frames, sort, &lens_names);
        Ok(frames)
    }

    pub fn delete_frame(&self, id: i64) -> Result<()> {
        self.catalog.delete_frame(id)
    }

    /// A frame's roll must exist, its gear must exist, its lens must be mounted
    /// to the roll's camera and its filter to its lens. Its picture may not be
    /// owned by any frame other than `existing`.
    fn validate_frame(&self, frame: &Frame, existing: Option<i64>) -> Result<()> {
        let roll = self
            .catalog
            .get_roll(frame.roll_id)?
            .ok_or_else(|| Error::Validation(format!("roll #{} does not exist", frame.roll_id)))?;

        if let Some(lens_id) = frame.lens_id {
            let lens = GearKey::lens(lens_id);
            if !self.catalog.gear_exists(lens)? {
                return Err(Error::Validation(format!("{lens} does not exist")));
            }
            if let Some(camera_id) = roll.camera_id {
                let camera = GearKey::camera(camera_id);
                if !self.catalog.is_mounted(camera, lens)? {
                    return Err(Error::Validation(format!(
                        "{lens} is not mountable to {camera}"
                    )));
                }
            }
        }

        if let Some(filter_id) = frame.filter_id {
            let filter = GearKey::filter(filter_id);
            if !self.catalog.gear_exists(filter)? {
                return Err(Error::Validation(format!("{filter} does not exist")));
            }
            if let Some(lens_id) = frame.lens_id {
                let lens = GearKey::lens(lens_id);
                if !self.catalog.is_mounted(filter, lens)? {
                    return Err(Error::Validation(format!(
                        "{filter} is not mountable to {lens}"
                    )));
                }
            }
        }

        if let Some(filename) = frame.picture_filename.as_deref().filter(|f| !f.is_empty()) {
            self.check_picture_owner(filename, existing)?;
        }
        Ok(())
    }

    fn check_picture_owner(&self, filename: &str, frame_id: Option<i64>) -> Result<()> {
        match self.catalog.frame_for_picture(filename)? {
            Some(owner) if Some(owner) != frame_id => Err(Error::Validation(format!(
                "{filename} is already attached to frame #{owner}"
            ))),
            _ => Ok(()),
        }
    }

    // ── Pictures ─────────────────────────────────────────────────────

    /// Reserve a path for a new picture (e.g. a camera capture target).
    pub fn new_picture(&self) -> Result<PathBuf> {
        self.pictures.create_placeholder()
    }

    pub fn picture_path(&self, filename: &str) -> PathBuf {
        self.pictures.path_for(filename)
    }

    /// Compress a picture already in the store (e.g. one written to a path
    /// from [`new_picture`](Self::new_picture)) and link it to a frame. A picture
    /// belongs to at most one frame; the frame's previous picture, if any,
    /// becomes an orphan.
    pub fn attach_picture(&self, frame_id: i64, filename: &str) -> Result<()> {
        self.frame(frame_id)?;
        let path = self.pictures.path_for(filename);
        if !path.is_file() {
            return Err(Error::PictureNotFound(filename.to_string()));
        }
        self.check_picture_owner(filename, Some(frame_id))?;

        pictures::compress::compress(&path, self.picture_max_dimension()?)?;
        self.catalog.set_frame_picture(frame_id, Some(filename))?;
        log::info!("Attached {filename} to frame #{frame_id}");
        Ok(())
    }

    /// Unlink a frame's picture and return its filename. The file stays on disk
    /// until orphan reclamation.
    pub fn detach_picture(&self, frame_id: i64) -> Result<Option<String>> {
        let previous = self.frame(frame_id)?.picture_filename;
        self.catalog.set_frame_picture(frame_id, None)?;
        Ok(previous)
    }

    /// Copy `source` into the picture store, compress it and attach it to a frame.
    /// Returns the stored filename.
    pub fn import_picture(&self, frame_id: i64, source: &Path) -> Result<String> {
        self.frame(frame_id)?;
        if !source.is_file() {
            return Err(Error::PictureNotFound(source.display().to_string()));
        }

        let target = self.pictures.create_placeholder()?;
        std::fs::copy(source, &target)?;
        if let Err(e) = pictures::compress::compress(&target, self.picture_max_dimension()?) {
            let _ = std::fs::remove_file(&target);
            return Err(e);
        }

        let filename = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.catalog.set_frame_picture(frame_id, Some(&filename))?;
        log::info!("Attached {} to frame #{frame_id} as {filename}", source.display());
        Ok(filename)
    }

    pub fn compress_picture(&self, filename: &str) -> Result<CompressOutcome> {
        self.pictures.compress(filename, self.picture_max_dimension()?)
    }

    /// Compress every referenced picture in parallel. Failures are logged and
    /// skipped; returns the number of pictures rewritten.
    pub fn compress_all_pictures(&self) -> Result<usize> {
        let max_dimension = self.picture_max_dimension()?;
        let referenced = self.catalog.complementary_picture_filenames()?;
        let files = self.pictures.referenced_files(&referenced)?;

        let compressed = files
            .par_iter()
            .filter(|path| match pictures::compress::compress(path, max_dimension) {
                Ok(outcome) => matches!(outcome, CompressOutcome::Compressed { .. }),
                Err(e) => {
                    log::warn!("Failed to compress {}: {e}", path.display());
                    false
                }
            })
            .count();
        Ok(compressed)
    }

    /// Delete picture files no frame references. Must not run concurrently
    /// with [`import_pictures`](Self::import_pictures).
    pub fn reclaim_orphans(&self) -> Result<Vec<PathBuf>> {
        self.pictures
            .reclaim_orphans(|| self.catalog.complementary_picture_filenames())
    }

    /// Start exporting all referenced pictures into a dated zip inside
    /// `target_dir`, or the configured export path when `None`.
    pub fn export_pictures(&self, target_dir: Option<&Path>) -> Result<ArchiveTask> {
        let dir = match target_dir {
            Some(dir) => dir.to_path_buf(),
            None => self.get_export_path()?.ok_or(Error::ExportPathNotSet)?,
        };
        if !dir.is_dir() {
            return Err(Error::ExportPathNotFound(dir));
        }

        let referenced = self.catalog.complementary_picture_filenames()?;
        let files = self.pictures.referenced_files(&referenced)?;
        let target = dir.join(pictures::archive_file_name(
            chrono::Local::now().date_naive(),
        ));
        log::info!("Exporting {} picture(s) to {}", files.len(), target.display());
        Ok(ArchiveTask::export(files, target))
    }

    /// Start extracting a picture archive into the picture directory.
    /// Existing files with the same names are overwritten. Must not run
    /// concurrently with [`reclaim_orphans`](Self::reclaim_orphans).
    pub fn import_pictures(&self, archive: &Path) -> ArchiveTask {
        ArchiveTask::import(archive.to_path_buf(), self.pictures.dir().to_path_buf())
    }

    pub fn copy_picture_to_gallery(&self, filename: &str, gallery_dir: &Path) -> Result<PathBuf> {
        self.pictures.copy_to_gallery(filename, gallery_dir)
    }

    // ── Config ───────────────────────────────────────────────────────

    /// Set the default directory for picture exports.
    pub fn set_export_path(&self, path: &Path) -> Result<()> {
        let canonical = path
            .canonicalize()
            .map_err(|_| Error::ExportPathNotFound(path.to_path_buf()))?;
        if !canonical.is_dir() {
            return Err(Error::ExportPathNotFound(path.to_path_buf()));
        }
        self.catalog
            .set_config("export_path", &canonical.to_string_lossy())
    }

    /// Get the current export destination path, if set.
    pub fn get_export_path(&self) -> Result<Option<PathBuf>> {
        Ok(self.catalog.get_config("export_path")?.map(PathBuf::from))
    }

    /// Longest allowed side of a stored picture. Unset or invalid values fall
    /// back to the default.
    pub fn picture_max_dimension(&self) -> Result<u32> {
        Ok(self
            .catalog
            .get_config("picture_max_dimension")?
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_MAX_DIMENSION))
    }

    pub fn set_picture_max_dimension(&self, max_dimension: u32) -> Result<()> {
        if max_dimension == 0 {
            return Err(Error::Validation(
                "picture max dimension must be positive".to_string(),
            ));
        }
        self.catalog
            .set_config("picture_max_dimension", &max_dimension.to_string())
    }
}
