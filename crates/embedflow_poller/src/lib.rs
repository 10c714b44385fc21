//! Embedflow Poller - Local Resource Polling
//!
//! A poller watches an application location, copies allowed files whose
//! modification time moved forward into a download location, and notifies an
//! executor once per pass when anything was copied.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐     ┌────────────┐
//! │  Location   │     │   Handler    │     │  Download   │     │  Executor  │
//! │  (local)    │────▶│ (walk, diff  │────▶│  location   │────▶│ (notified  │
//! │             │     │  vs state)   │     │             │     │  once)     │
//! └─────────────┘     └──────────────┘     └─────────────┘     └────────────┘
//! ```
//!
//! Poll passes never fail as a whole: per-file failures are logged and
//! collected in the [`PollReport`].

pub mod config;
pub mod error;
pub mod handler;
pub mod local;
pub mod notifier;
pub mod state;

// Re-exports for convenience
pub use config::{AppLocation, ExecutorConfig, LocationKind, PollerConfig};
pub use error::{PollerError, Result};
pub use handler::{handler_for, HandlerContext, PollError, PollReport, ResourceHandler};
pub use local::LocalResourceHandler;
pub use notifier::{
    notifier_from_config, ChannelNotifier, CommandNotifier, ExecutorNotifier, LogNotifier,
    PollNotification,
};
pub use state::ObjectStateStore;
