//! Keeps an MPD database in sync with a music library.
//!
//! The core is [`UpdateSession`]: connect to MPD, authenticate when a
//! password is configured, request a full or path-scoped `update` and
//! disconnect. [`UpdateNotifier`] wires library change events to it so one
//! update runs per batch of changes.

mod config;
mod hook;
mod mpd;

pub use config::{AppConfig, ConfigError, MpdConfig};
pub use hook::{LibraryEvent, NotifierError, UpdateNotifier, OUTCOME_BACKLOG};
pub use mpd::{
  relative_path, Connection, Endpoint, HandshakeOutcome, LineSocket, MpdCommand, SocketError,
  Transport, UpdateScope, UpdateSession,
};

/// Install the `env_logger` backend, honouring `RUST_LOG` (default `info`).
pub fn init_logging() {
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format_timestamp_secs()
    .try_init();
}
