//! Executor notification
//!
//! A poll pass that downloaded anything notifies its executor exactly once.
//! Failures are reported back to the handler, which logs them and carries on.

use crate::config::ExecutorConfig;
use crate::error::{PollerError, Result};
use chrono::{DateTime, Utc};
use std::process::Command;
use std::sync::mpsc::Sender;
use tracing::info;

/// Summary of a pass that changed the download location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollNotification {
    pub app_path: String,
    pub download_location: String,
    /// Basenames downloaded during the pass, in walk order
    pub changed_files: Vec<String>,
    pub polled_at: DateTime<Utc>,
}

/// Receives change notifications.
pub trait ExecutorNotifier: Send {
    fn notify(&self, notification: &PollNotification) -> Result<()>;
}

/// Logs the notification and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ExecutorNotifier for LogNotifier {
    fn notify(&self, notification: &PollNotification) -> Result<()> {
        info!(
            app_path = %notification.app_path,
            changed = notification.changed_files.len(),
            files = ?notification.changed_files,
            "Resources changed"
        );
        Ok(())
    }
}

/// Runs a command and waits for it. A non-zero exit is an error.
///
/// The command sees `EMBEDFLOW_APP_PATH`, `EMBEDFLOW_DOWNLOAD_LOCATION` and
/// `EMBEDFLOW_CHANGED_FILES` (newline separated) in its environment.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ExecutorNotifier for CommandNotifier {
    fn notify(&self, notification: &PollNotification) -> Result<()> {
        info!(program = %self.program, "Notifying executor");
        let status = Command::new(&self.program)
            .args(&self.args)
            .env("EMBEDFLOW_APP_PATH", &notification.app_path)
            .env("EMBEDFLOW_DOWNLOAD_LOCATION", &notification.download_location)
            .env("EMBEDFLOW_CHANGED_FILES", notification.changed_files.join("\n"))
            .status()
            .map_err(|e| PollerError::Notify(format!("failed to start '{}': {}", self.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(PollerError::Notify(format!(
                "'{}' exited with {}",
                self.program, status
            )))
        }
    }
}

/// Forwards notifications to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<PollNotification>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<PollNotification>) -> Self {
        Self { tx }
    }
}

impl ExecutorNotifier for ChannelNotifier {
    fn notify(&self, notification: &PollNotification) -> Result<()> {
        self.tx
            .send(notification.clone())
            .map_err(|_| PollerError::Notify("receiver dropped".to_string()))
    }
}

/// Notifier for an executor configuration.
pub fn notifier_from_config(config: &ExecutorConfig) -> Box<dyn ExecutorNotifier> {
    match config.command.split_first() {
        Some((program, args)) => Box::new(CommandNotifier::new(program.clone(), args.to_vec())),
        None => Box::new(LogNotifier),
    }
}
