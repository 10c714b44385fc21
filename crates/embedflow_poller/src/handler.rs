//! Resource handlers
//!
//! A handler owns a [`HandlerContext`] (configuration, state store and
//! notifier) and implements one polling pass over its backend.

use crate::config::{LocationKind, PollerConfig};
use crate::error::{PollerError, Result};
use crate::local::LocalResourceHandler;
use crate::notifier::{ExecutorNotifier, PollNotification};
use crate::state::ObjectStateStore;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Outcome of a single polling pass
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    /// Regular files found under the watched location
    pub files_seen: u64,
    /// Files skipped because their name is not allowed
    pub files_skipped: u64,
    pub files_downloaded: u64,
    pub files_unchanged: u64,
    /// Basenames downloaded during the pass
    pub changed_files: Vec<String>,
    /// Per-file failures; the pass continued past each of them
    pub errors: Vec<PollError>,
    /// True when the executor accepted the notification
    pub notified: bool,
}

impl PollReport {
    pub fn has_changes(&self) -> bool {
        !self.changed_files.is_empty()
    }
}

/// A failure isolated to one file
#[derive(Debug, Clone)]
pub struct PollError {
    pub path: String,
    pub message: String,
}

/// State shared by every handler implementation.
pub struct HandlerContext {
    config: PollerConfig,
    state: ObjectStateStore,
    notifier: Box<dyn ExecutorNotifier>,
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl HandlerContext {
    /// Build a context, loading state from `state_path` when one is configured.
    pub fn new(config: PollerConfig, notifier: Box<dyn ExecutorNotifier>) -> Result<Self> {
        let state = match &config.state_path {
            Some(path) => ObjectStateStore::load(Path::new(path))?,
            None => ObjectStateStore::new(),
        };
        Ok(Self::with_state(config, state, notifier))
    }

    pub fn with_state(
        config: PollerConfig,
        state: ObjectStateStore,
        notifier: Box<dyn ExecutorNotifier>,
    ) -> Self {
        Self {
            config,
            state,
            notifier,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn state(&self) -> &ObjectStateStore {
        &self.state
    }

    pub fn is_object_outdated(&self, file_time: DateTime<Utc>, object_name: &str) -> bool {
        self.state.is_object_outdated(file_time, object_name)
    }

    pub fn record_object(&mut self, object_name: &str, file_time: DateTime<Utc>) {
        self.state.record(object_name, file_time);
    }

    /// Where an object with this basename lands
    pub fn destination_path(&self, object_name: &str) -> PathBuf {
        Path::new(&self.config.download_location).join(object_name)
    }

    /// Notify the executor. Failures are logged and reported as `false`.
    pub fn notify_executor(&self, changed_files: &[String]) -> bool {
        let notification = PollNotification {
            app_path: self.config.app_location.path.clone(),
            download_location: self.config.download_location.clone(),
            changed_files: changed_files.to_vec(),
            polled_at: Utc::now(),
        };
        match self.notifier.notify(&notification) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to notify executor");
                false
            }
        }
    }

    /// Persist state when a state path is configured.
    pub fn save_state(&self) -> Result<()> {
        if let Some(path) = &self.config.state_path {
            self.state.save(Path::new(path))?;
            debug!(path = %path, objects = self.state.len(), "Saved poller state");
        }
        Ok(())
    }
}

/// A storage backend that can be polled for changed objects.
pub trait ResourceHandler {
    fn context(&self) -> &HandlerContext;

    /// Backend name the objects are read from
    fn bucket(&self) -> &str;

    /// Transfer a single object. `destination`'s parent already exists.
    fn download(&self, source: &Path, destination: &Path) -> std::io::Result<()>;

    /// Run one pass: download outdated allowed objects and notify once.
    fn poll(&mut self) -> PollReport;

    /// Create the destination's parent directories and download into it.
    fn download_file(&self, bucket: &str, source: &Path, destination: &Path) -> Result<()> {
        let wrap = |error| PollerError::Download {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            error,
        };
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
        info!(
            bucket,
            source = %source.display(),
            destination = %destination.display(),
            "Downloading file"
        );
        self.download(source, destination).map_err(wrap)
    }
}

/// Handler for the location a configuration describes.
pub fn handler_for(
    config: PollerConfig,
    notifier: Box<dyn ExecutorNotifier>,
) -> Result<Box<dyn ResourceHandler>> {
    config.validate()?;
    match config.app_location.kind {
        LocationKind::Local => {
            let context = HandlerContext::new(config, notifier)?;
            Ok(Box::new(LocalResourceHandler::new(context)))
        }
    }
}
