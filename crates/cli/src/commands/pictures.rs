use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use filmlog_core::pictures::archive::{ArchiveEvent, ArchiveOutcome, ArchiveTask};
use filmlog_core::pictures::CompressOutcome;
use filmlog_core::Logbook;
use indicatif::{ProgressBar, ProgressStyle};

pub fn new(logbook: &Logbook) -> Result<()> {
    let path = logbook.new_picture()?;
    println!("{}", path.display());
    Ok(())
}

/// Pictures already in the store (from `pictures new`) are compressed and
/// linked where they are; anything else is copied in first.
pub fn attach(logbook: &Logbook, frame_id: i64, file: PathBuf) -> Result<()> {
    if let Some(filename) = stored_name(logbook, &file) {
        logbook.attach_picture(frame_id, &filename)?;
        println!("Attached {filename} to frame {frame_id}");
        return Ok(());
    }
    let filename = logbook.import_picture(frame_id, &file)?;
    println!("Attached {} to frame {frame_id} as {filename}", file.display());
    Ok(())
}

/// The store filename of `file`, when `file` lives directly in the store.
fn stored_name(logbook: &Logbook, file: &Path) -> Option<String> {
    let filename = file.file_name()?.to_str()?.to_string();
    let in_store = logbook.picture_path(&filename).canonicalize().ok()?;
    (file.canonicalize().ok()? == in_store).then_some(filename)
}

pub fn detach(logbook: &Logbook, frame_id: i64) -> Result<()> {
    match logbook.detach_picture(frame_id)? {
        Some(filename) => println!("Detached {filename} from frame {frame_id}"),
        None => println!("Frame {frame_id} has no picture"),
    }
    Ok(())
}

pub fn compress(logbook: &Logbook, filename: Option<String>) -> Result<()> {
    let Some(filename) = filename else {
        let count = logbook.compress_all_pictures()?;
        println!("Compressed {count} picture(s)");
        return Ok(());
    };

    match logbook.compress_picture(&filename)? {
        CompressOutcome::Compressed { width, height } => {
            println!("Compressed {filename} to {width}x{height}")
        }
        CompressOutcome::Unchanged { width, height } => {
            println!("{filename} is already small enough ({width}x{height})")
        }
        CompressOutcome::Missing => bail!("no picture named {filename}"),
    }
    Ok(())
}

pub fn gc(logbook: &Logbook) -> Result<()> {
    let deleted = logbook.reclaim_orphans()?;
    for path in &deleted {
        log::info!("Deleted {}", path.display());
    }
    println!("Removed {} unused picture(s)", deleted.len());
    Ok(())
}

pub fn export(logbook: &Logbook, dir: Option<PathBuf>) -> Result<()> {
    let task = logbook.export_pictures(dir.as_deref())?;
    let outcome = run_with_progress(task, "Exporting pictures...")?;

    match outcome.archive {
        Some(archive) => println!(
            "Exported {} picture(s) to {}",
            outcome.completed,
            archive.display()
        ),
        None => println!("No pictures to export."),
    }
    Ok(())
}

pub fn import(logbook: &Logbook, archive: PathBuf) -> Result<()> {
    let task = logbook.import_pictures(&archive);
    let outcome = run_with_progress(task, "Importing pictures...")?;
    println!("Imported {} picture(s)", outcome.completed);
    Ok(())
}

pub fn gallery(logbook: &Logbook, filename: &str, dir: PathBuf) -> Result<()> {
    let copy = logbook.copy_picture_to_gallery(filename, &dir)?;
    println!("Copied to {}", copy.display());
    Ok(())
}

pub fn export_set(logbook: &Logbook, path: PathBuf) -> Result<()> {
    logbook.set_export_path(&path)?;
    if let Some(resolved) = logbook.get_export_path()? {
        println!("Export path set to: {}", resolved.display());
    }
    Ok(())
}

pub fn export_show(logbook: &Logbook) -> Result<()> {
    match logbook.get_export_path()? {
        Some(path) => println!("Export path: {}", path.display()),
        None => println!(
            "No export path configured. Use `filmlog pictures export-set <path>` to set one."
        ),
    }
    Ok(())
}

pub fn max_dimension(logbook: &Logbook, value: Option<u32>) -> Result<()> {
    if let Some(value) = value {
        logbook.set_picture_max_dimension(value)?;
    }
    println!(
        "Pictures are limited to {} px on the longer side",
        logbook.picture_max_dimension()?
    );
    Ok(())
}

/// Drive an archive task to completion, mirroring its events on a progress bar.
fn run_with_progress(task: ArchiveTask, message: &'static str) -> Result<ArchiveOutcome> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut outcome = None;
    for event in task {
        match event {
            ArchiveEvent::Started { total } => {
                pb.set_length(total as u64);
                pb.set_position(0);
                pb.set_message(message);
            }
            ArchiveEvent::Progress(progress) => {
                pb.set_position(progress.completed as u64);
                pb.set_message(format!("{}%", progress.percent));
            }
            ArchiveEvent::Finished(result) => outcome = Some(result),
        }
    }

    let Some(outcome) = outcome else {
        bail!("archive task ended without a result");
    };
    if !outcome.success {
        pb.abandon_with_message("failed");
        bail!(
            "archive operation failed after {} file(s); run with --verbose for details",
            outcome.completed
        );
    }
    pb.finish_with_message("done");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_only_for_files_in_store() {
        let tmp = tempfile::tempdir().unwrap();
        let logbook = Logbook::open(tmp.path()).unwrap();

        let placeholder = logbook.new_picture().unwrap();
        std::fs::write(&placeholder, b"pixels").unwrap();
        let expected = placeholder.file_name().unwrap().to_str().unwrap().to_string();
        assert_eq!(stored_name(&logbook, &placeholder), Some(expected.clone()));

        let outside = tmp.path().join(&expected);
        std::fs::write(&outside, b"pixels").unwrap();
        assert_eq!(stored_name(&logbook, &outside), None);
        assert_eq!(stored_name(&logbook, &tmp.path().join("missing.jpg")), None);
    }
}
