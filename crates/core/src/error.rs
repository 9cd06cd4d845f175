use std::path::PathBuf;

use crate::domain::GearKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "turbojpeg")]
    #[error("JPEG decoding error: {0}")]
    Jpeg(#[from] turbojpeg::Error),

    #[error("image resize error: {0}")]
    Resize(String),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} is being used and cannot be deleted")]
    GearInUse(GearKey),

    #[error("{0} not found")]
    GearNotFound(GearKey),

    #[error("{a} cannot be mounted to {b}")]
    NotMountable { a: GearKey, b: GearKey },

    #[error("roll not found: {0}")]
    RollNotFound(i64),

    #[error("frame not found: {0}")]
    FrameNotFound(i64),

    #[error("complementary picture not found: {0}")]
    PictureNotFound(String),

    #[error("archive entry escapes the target directory: {0}")]
    UnsafeArchiveEntry(String),

    #[error("catalog schema version {db} is newer than supported version {code}")]
    SchemaTooNew { db: u32, code: u32 },

    #[error("export path not configured; run `filmlog pictures export-set <path>` first")]
    ExportPathNotSet,

    #[error("export path does not exist: {}", .0.display())]
    ExportPathNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
