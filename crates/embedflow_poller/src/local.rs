//! Local filesystem handler

use crate::config::same_location;
use crate::error::{PollerError, Result};
use crate::handler::{HandlerContext, PollError, PollReport, ResourceHandler};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Polls a directory on the local filesystem.
#[derive(Debug)]
pub struct LocalResourceHandler {
    context: HandlerContext,
}

impl LocalResourceHandler {
    pub fn new(context: HandlerContext) -> Self {
        Self { context }
    }

    pub fn into_context(self) -> HandlerContext {
        self.context
    }

    fn root(&self) -> PathBuf {
        PathBuf::from(&self.context.config().app_location.path)
    }

    /// Download `path` if it is outdated. Returns whether it was downloaded.
    fn process_file(&mut self, path: &Path, file_name: &str) -> Result<bool> {
        let modified = std::fs::metadata(path)?.modified()?;
        let file_time = DateTime::<Utc>::from(modified);

        if !self.context.is_object_outdated(file_time, file_name) {
            return Ok(false);
        }

        let destination = self.context.destination_path(file_name);
        if same_location(path, &destination) {
            warn!(path = %path.display(), "Source is its own destination, not copying");
            return Ok(false);
        }
        self.download_file(self.bucket(), path, &destination)?;
        self.context.record_object(file_name, file_time);
        Ok(true)
    }
}

/// Regular files, and links that do not point at a directory. Links are
/// followed for metadata and copying; a dangling one fails as `NotFound`.
fn is_candidate_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && !entry.path().is_dir())
}

/// The I/O error behind a per-file failure, if there is one
fn io_kind(err: &PollerError) -> Option<io::ErrorKind> {
    match err {
        PollerError::Io(e) | PollerError::Download { error: e, .. } => Some(e.kind()),
        _ => None,
    }
}

impl ResourceHandler for LocalResourceHandler {
    fn context(&self) -> &HandlerContext {
        &self.context
    }

    fn bucket(&self) -> &str {
        "local"
    }

    fn download(&self, source: &Path, destination: &Path) -> io::Result<()> {
        std::fs::copy(source, destination).map(|_| ())
    }

    fn poll(&mut self) -> PollReport {
        let root = self.root();
        let mut report = PollReport::default();

        if !root.is_dir() {
            error!(path = %root.display(), "Path does not exist or is not a directory");
            return report;
        }

        // Copies must never be picked up again as sources
        let download_dir = PathBuf::from(&self.context.config().download_location);
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.depth() > 0 && e.file_type().is_dir() && same_location(e.path(), &download_dir))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    let err = PollerError::from(e);
                    warn!(path = %path, error = %err, "Failed to read directory entry");
                    report.errors.push(PollError {
                        path,
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            if !is_candidate_file(&entry) {
                continue;
            }
            report.files_seen += 1;

            let file_name = entry.file_name().to_string_lossy().to_string();
            if !self.context.config().is_allowed(&file_name) {
                info!(
                    file_name = %file_name,
                    allowed_files = ?self.context.config().allowed_files,
                    "Skipping file, not in allowed files"
                );
                report.files_skipped += 1;
                continue;
            }

            match self.process_file(entry.path(), &file_name) {
                Ok(true) => {
                    report.files_downloaded += 1;
                    report.changed_files.push(file_name);
                }
                Ok(false) => report.files_unchanged += 1,
                Err(e) => {
                    match io_kind(&e) {
                        Some(io::ErrorKind::NotFound) | Some(io::ErrorKind::PermissionDenied) => {
                            error!(path = %entry.path().display(), error = %e, "Failed to download file");
                        }
                        kind => {
                            error!(
                                path = %entry.path().display(),
                                kind = ?kind,
                                error = %e,
                                "Unexpected failure while processing file"
                            );
                        }
                    }
                    report.errors.push(PollError {
                        path: entry.path().display().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if report.has_changes() {
            report.notified = self.context.notify_executor(&report.changed_files);
            if let Err(e) = self.context.save_state() {
                error!(error = %e, "Failed to save poller state");
            }
        }

        info!(
            path = %root.display(),
            seen = report.files_seen,
            downloaded = report.files_downloaded,
            unchanged = report.files_unchanged,
            skipped = report.files_skipped,
            errors = report.errors.len(),
            "Poll complete"
        );
        report
    }
}
