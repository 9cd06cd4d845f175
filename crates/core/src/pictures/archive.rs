//! Zip export/import of picture files with a progress event stream.
//!
//! [`write_archive`] and [`extract_archive`] run synchronously and report to a
//! sink. [`ArchiveTask`] runs either one on a worker thread and hands the
//! events back as an iterator.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveProgress {
    pub percent: usize,
    pub completed: usize,
    pub total: usize,
}

impl ArchiveProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 { 100 } else { completed * 100 / total };
        Self {
            percent,
            completed,
            total,
        }
    }
}

/// Final result of an archive operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub success: bool,
    /// Entries fully processed, also when the operation failed part way.
    pub completed: usize,
    /// The written archive on a successful, non-empty export.
    pub archive: Option<PathBuf>,
    pub canceled: bool,
}

impl ArchiveOutcome {
    fn succeeded(completed: usize, archive: Option<PathBuf>) -> Self {
        Self {
            success: true,
            completed,
            archive,
            canceled: false,
        }
    }

    fn failed(completed: usize, canceled: bool) -> Self {
        Self {
            success: false,
            completed,
            archive: None,
            canceled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    /// Work started; `total` entries will be processed.
    Started { total: usize },
    /// One more entry was processed.
    Progress(ArchiveProgress),
    /// Always the last event.
    Finished(ArchiveOutcome),
}

/// Zip `files` into `target`, one entry per file named after the file.
///
/// Emits `Started` and then `Progress` after each entry. With no files nothing
/// is written and the outcome is successful. Any error aborts the whole
/// operation; entries already written are not rolled back. Cancellation is
/// checked before each entry.
pub fn write_archive(
    files: &[PathBuf],
    target: &Path,
    cancel: &AtomicBool,
    sink: &mut dyn FnMut(ArchiveEvent),
) -> ArchiveOutcome {
    let total = files.len();
    sink(ArchiveEvent::Started { total });
    if total == 0 {
        log::info!("No pictures to export");
        return ArchiveOutcome::succeeded(0, None);
    }

    let mut completed = 0;
    match zip_files(files, target, cancel, sink, &mut completed) {
        Ok(true) => {
            log::info!("Exported {completed} picture(s) to {}", target.display());
            ArchiveOutcome::succeeded(completed, Some(target.to_path_buf()))
        }
        Ok(false) => {
            log::info!("Export canceled after {completed} of {total} picture(s)");
            ArchiveOutcome::failed(completed, true)
        }
        Err(e) => {
            log::warn!("Export to {} failed after {completed} picture(s): {e}", target.display());
            ArchiveOutcome::failed(completed, false)
        }
    }
}

fn zip_files(
    files: &[PathBuf],
    target: &Path,
    cancel: &AtomicBool,
    sink: &mut dyn FnMut(ArchiveEvent),
    completed: &mut usize,
) -> Result<bool> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(BufWriter::new(File::create(target)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        if cancel.load(Ordering::Relaxed) {
            zip.finish()?;
            return Ok(false);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Validation(format!("not a file: {}", path.display())))?;

        zip.start_file(name.as_str(), options)?;
        let mut source = BufReader::new(File::open(path)?);
        std::io::copy(&mut source, &mut zip)?;
        log::debug!("Archived {name}");

        *completed += 1;
        if !cancel.load(Ordering::Relaxed) {
            sink(ArchiveEvent::Progress(ArchiveProgress::new(*completed, files.len())));
        }
    }

    zip.finish()?.flush()?;
    Ok(true)
}

/// Extract every entry of `archive` into `target_dir`.
///
/// Emits `Started` with the number of file entries, then `Progress` after each
/// extracted file. Directory entries are recreated; existing files are
/// overwritten. An entry whose path would land outside `target_dir` fails the
/// whole operation.
pub fn extract_archive(
    archive: &Path,
    target_dir: &Path,
    cancel: &AtomicBool,
    sink: &mut dyn FnMut(ArchiveEvent),
) -> ArchiveOutcome {
    let mut completed = 0;
    match unzip_files(archive, target_dir, cancel, sink, &mut completed) {
        Ok(true) => {
            log::info!("Imported {completed} picture(s) from {}", archive.display());
            ArchiveOutcome::succeeded(completed, None)
        }
        Ok(false) => {
            log::info!("Import canceled after {completed} picture(s)");
            ArchiveOutcome::failed(completed, true)
        }
        Err(e) => {
            log::warn!("Import from {} failed after {completed} picture(s): {e}", archive.display());
            ArchiveOutcome::failed(completed, false)
        }
    }
}

fn unzip_files(
    archive: &Path,
    target_dir: &Path,
    cancel: &AtomicBool,
    sink: &mut dyn FnMut(ArchiveEvent),
    completed: &mut usize,
) -> Result<bool> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
    let total = zip.file_names().filter(|n| !n.ends_with('/')).count();
    sink(ArchiveEvent::Started { total });

    std::fs::create_dir_all(target_dir)?;
    for i in 0..zip.len() {
        if cancel.load(Ordering::Relaxed) {
            return Ok(false);
        }
        let mut entry = zip.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| Error::UnsafeArchiveEntry(entry.name().to_string()))?;
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&out_path)?);
        std::io::copy(&mut entry, &mut out)?;
        out.flush()?;
        log::debug!("Extracted {}", out_path.display());

        *completed += 1;
        if !cancel.load(Ordering::Relaxed) {
            sink(ArchiveEvent::Progress(ArchiveProgress::new(*completed, total)));
        }
    }
    Ok(true)
}

/// An archive operation running on its own thread.
///
/// Iterating yields the operation's events on the caller's thread and ends
/// after `Finished`. Once [`cancel`](Self::cancel) is called no further
/// `Progress` events are yielded. Dropping the task cancels it.
#[derive(Debug)]
pub struct ArchiveTask {
    events: Receiver<ArchiveEvent>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    last_completed: usize,
    finished: bool,
}

impl ArchiveTask {
    /// Run `work` on a new thread, forwarding everything it emits.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&AtomicBool, &mut dyn FnMut(ArchiveEvent)) -> ArchiveOutcome + Send + 'static,
    {
        let (tx, rx) = bounded(EVENT_BUFFER);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let handle = thread::spawn(move || {
            let mut forward = |event: ArchiveEvent| {
                // Receiver gone means the task was dropped; the flag stops the work.
                let _ = tx.send(event);
            };
            let sink: &mut dyn FnMut(ArchiveEvent) = &mut forward;
            let outcome = work(flag.as_ref(), sink);
            let _ = tx.send(ArchiveEvent::Finished(outcome));
        });

        Self {
            events: rx,
            cancel,
            handle: Some(handle),
            last_completed: 0,
            finished: false,
        }
    }

    pub fn export(files: Vec<PathBuf>, target: PathBuf) -> Self {
        Self::spawn(move |cancel, sink| write_archive(&files, &target, cancel, sink))
    }

    pub fn import(archive: PathBuf, target_dir: PathBuf) -> Self {
        Self::spawn(move |cancel, sink| extract_archive(&archive, &target_dir, cancel, sink))
    }

    /// Ask the worker to stop before its next entry.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Drain the remaining events and return the outcome.
    pub fn wait(mut self) -> ArchiveOutcome {
        let mut outcome = None;
        for event in self.by_ref() {
            if let ArchiveEvent::Finished(o) = event {
                outcome = Some(o);
            }
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        outcome.unwrap_or_else(|| ArchiveOutcome::failed(self.last_completed, self.is_canceled()))
    }
}

impl Iterator for ArchiveTask {
    type Item = ArchiveEvent;

    fn next(&mut self) -> Option<ArchiveEvent> {
        if self.finished {
            return None;
        }
        loop {
            match self.events.recv() {
                Ok(ArchiveEvent::Progress(p)) => {
                    self.last_completed = p.completed;
                    if self.is_canceled() {
                        continue;
                    }
                    return Some(ArchiveEvent::Progress(p));
                }
                Ok(event) => {
                    if matches!(event, ArchiveEvent::Finished(_)) {
                        self.finished = true;
                    }
                    return Some(event);
                }
                Err(_) => {
                    // Worker died without reporting
                    log::warn!("Archive worker exited without a result");
                    self.finished = true;
                    return Some(ArchiveEvent::Finished(ArchiveOutcome::failed(
                        self.last_completed,
                        self.is_canceled(),
                    )));
                }
            }
        }
    }
}

impl Drop for ArchiveTask {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel();
        }
    }
}
