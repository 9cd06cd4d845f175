//! Complementary picture files: one optional reference photo per frame,
//! stored flat in a private directory and named `<uuid>.jpg`.

pub mod archive;
pub mod compress;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub use compress::CompressOutcome;

/// Default bound for the longer side of a compressed picture.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

const PICTURE_EXTENSION: &str = "jpg";

pub struct PictureStore {
    dir: PathBuf,
}

impl PictureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Reserve a fresh `<uuid>.jpg` path, creating the directory if needed.
    /// Nothing is written to the file itself.
    pub fn create_placeholder(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let filename = format!("{}.{PICTURE_EXTENSION}", uuid::Uuid::new_v4());
        Ok(self.dir.join(filename))
    }

    /// Compress a stored picture in place. See [`compress::compress`].
    pub fn compress(&self, filename: &str, max_dimension: u32) -> Result<CompressOutcome> {
        compress::compress(&self.path_for(filename), max_dimension)
    }

    /// Regular files directly inside the picture directory, sorted by name.
    /// A missing directory has no files.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Delete every file not named in the reference set.
    ///
    /// The directory is listed before `referenced` is called, so a file that
    /// is created (and referenced) after the listing is never considered.
    /// Callers must not run this concurrently with an import into the same
    /// directory. Returns the deleted paths.
    pub fn reclaim_orphans<F>(&self, referenced: F) -> Result<Vec<PathBuf>>
    where
        F: FnOnce() -> Result<HashSet<String>>,
    {
        let listed = self.list_files()?;
        if listed.is_empty() {
            return Ok(Vec::new());
        }
        let referenced = referenced()?;

        let mut deleted = Vec::new();
        for path in listed {
            let name = file_name(&path);
            if referenced.contains(name.as_str()) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => deleted.push(path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to delete orphan {}: {e}", path.display()),
            }
        }
        if !deleted.is_empty() {
            log::info!("Reclaimed {} orphaned picture(s)", deleted.len());
        }
        Ok(deleted)
    }

    /// Existing files named in the reference set, sorted by name.
    pub fn referenced_files(&self, referenced: &HashSet<String>) -> Result<Vec<PathBuf>> {
        Ok(self
            .list_files()?
            .into_iter()
            .filter(|p| referenced.contains(file_name(p).as_str()))
            .collect())
    }

    /// Copy a picture into a public directory, creating it if needed.
    pub fn copy_to_gallery(&self, filename: &str, gallery_dir: &Path) -> Result<PathBuf> {
        let source = self.path_for(filename);
        if !source.is_file() {
            return Err(Error::PictureNotFound(filename.to_string()));
        }
        std::fs::create_dir_all(gallery_dir)?;
        let target = gallery_dir.join(filename);
        std::fs::copy(&source, &target)?;
        log::info!("Copied {filename} to {}", gallery_dir.display());
        Ok(target)
    }
}

/// Default name for an export archive created on `date`.
pub fn archive_file_name(date: NaiveDate) -> String {
    format!("filmlog_pictures_{}.zip", date.format("%Y-%m-%d"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| file_name(p)).collect()
    }

    #[test]
    fn test_create_placeholder_makes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(tmp.path().join("nested/pictures"));

        let a = store.create_placeholder().unwrap();
        let b = store.create_placeholder().unwrap();

        assert!(store.dir().is_dir());
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(store.dir()));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert!(!a.exists());
        // uuid v4 in hyphenated form
        assert_eq!(file_name(&a).len(), 36 + 4);
    }

    #[test]
    fn test_reclaim_orphans_keeps_referenced() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(tmp.path());
        touch(tmp.path(), "a.jpg");
        touch(tmp.path(), "b.jpg");
        touch(tmp.path(), "c.jpg");
        std::fs::create_dir(tmp.path().join("subdir")).unwrap();

        let deleted = store
            .reclaim_orphans(|| Ok(HashSet::from(["a.jpg".to_string(), "c.jpg".to_string()])))
            .unwrap();

        assert_eq!(names(&deleted), vec!["b.jpg"]);
        assert_eq!(names(&store.list_files().unwrap()), vec!["a.jpg", "c.jpg"]);
        assert!(tmp.path().join("subdir").is_dir());
    }

    #[test]
    fn test_reclaim_ignores_files_created_after_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(tmp.path());
        touch(tmp.path(), "old.jpg");

        // The reference query runs after the listing; a file added meanwhile
        // is absent from both and must survive.
        let deleted = store
            .reclaim_orphans(|| {
                touch(tmp.path(), "new.jpg");
                Ok(HashSet::new())
            })
            .unwrap();

        assert_eq!(names(&deleted), vec!["old.jpg"]);
        assert!(tmp.path().join("new.jpg").exists());
    }

    #[test]
    fn test_reclaim_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(tmp.path().join("never-created"));
        let deleted = store
            .reclaim_orphans(|| panic!("reference set must not be needed"))
            .unwrap();
        assert!(deleted.is_empty());
    }

    #[test]
    fn test_referenced_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(tmp.path());
        touch(tmp.path(), "z.jpg");
        touch(tmp.path(), "m.jpg");
        touch(tmp.path(), "orphan.jpg");

        let referenced = HashSet::from([
            "z.jpg".to_string(),
            "m.jpg".to_string(),
            "gone.jpg".to_string(),
        ]);
        let files = store.referenced_files(&referenced).unwrap();
        assert_eq!(names(&files), vec!["m.jpg", "z.jpg"]);
    }

    #[test]
    fn test_copy_to_gallery() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(tmp.path().join("pictures"));
        std::fs::create_dir_all(store.dir()).unwrap();
        touch(store.dir(), "p.jpg");

        let gallery = tmp.path().join("gallery/filmlog");
        let copied = store.copy_to_gallery("p.jpg", &gallery).unwrap();
        assert_eq!(std::fs::read(&copied).unwrap(), b"p.jpg");

        assert!(matches!(
            store.copy_to_gallery("missing.jpg", &gallery).unwrap_err(),
            Error::PictureNotFound(_)
        ));
    }

    #[test]
    fn test_archive_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(archive_file_name(date), "filmlog_pictures_2024-02-29.zip");
    }
}
