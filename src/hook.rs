//! Library change notifications.
//!
//! Changes are collected while a batch of library edits runs; one MPD
//! update is issued when the batch completes, for the last requested scope.

use std::path::PathBuf;
use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::MpdConfig;
use crate::mpd::{HandshakeOutcome, UpdateScope, UpdateSession};

/// Outcomes kept for the host before newer ones are dropped.
pub const OUTCOME_BACKLOG: usize = 8;

#[derive(Error, Debug)]
pub enum NotifierError {
  #[error("Update worker stopped")]
  Closed,
}

/// Event raised by the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
  /// An item was added, changed or removed. `path` is its absolute path
  /// when known.
  DatabaseChange { path: Option<PathBuf> },
  /// An album import finished.
  AlbumImported,
  /// The current batch of library changes is done.
  BatchComplete,
}

/// Worker channel message.
enum WorkerMessage {
  Event(LibraryEvent),
  Close,
}

/// Runs MPD updates on behalf of the host application.
pub struct UpdateNotifier {
  config: Arc<RwLock<MpdConfig>>,
  event_tx: Sender<WorkerMessage>,
  outcome_rx: Receiver<HandshakeOutcome>,
  _worker_handle: JoinHandle<()>,
}

impl UpdateNotifier {
  /// Start the update worker. Must be called inside a tokio runtime.
  pub fn spawn(config: MpdConfig) -> Self {
    let config = Arc::new(RwLock::new(config));
    let (event_tx, event_rx) = async_channel::unbounded();
    let (outcome_tx, outcome_rx) = async_channel::bounded(OUTCOME_BACKLOG);

    let worker_config = config.clone();
    let worker_handle = tokio::spawn(async move {
      Self::worker_loop(event_rx, worker_config, outcome_tx).await;
    });

    Self {
      config,
      event_tx,
      outcome_rx,
      _worker_handle: worker_handle,
    }
  }

  async fn worker_loop(
    event_rx: Receiver<WorkerMessage>,
    config: Arc<RwLock<MpdConfig>>,
    outcome_tx: Sender<HandshakeOutcome>,
  ) {
    log::info!("MPD update worker started");
    let mut pending: Option<UpdateScope> = None;

    while let Ok(msg) = event_rx.recv().await {
      match msg {
        WorkerMessage::Event(LibraryEvent::DatabaseChange { path }) => {
          log::info!("db_change for {:?}", path);
          let config = config.read();
          pending = Some(UpdateScope::for_item(
            path.as_deref(),
            config.music_directory.as_deref(),
            config.granular_update,
          ));
        }
        WorkerMessage::Event(LibraryEvent::AlbumImported) => {
          log::info!("album_imported");
        }
        WorkerMessage::Event(LibraryEvent::BatchComplete) => {
          let Some(scope) = pending.take() else {
            log::debug!("Batch complete without library changes");
            continue;
          };
          let session = {
            let config = config.read();
            UpdateSession::new(&config)
          };
          let outcome = session.run(&scope).await;
          if let Err(TrySendError::Full(outcome)) = outcome_tx.try_send(outcome) {
            log::warn!("Outcome backlog full, dropping: {}", outcome);
          }
        }
        WorkerMessage::Close => {
          log::info!("MPD update worker closing");
          break;
        }
      }
    }
  }

  /// Forward a library event to the worker.
  pub async fn notify(&self, event: LibraryEvent) -> Result<(), NotifierError> {
    self
      .event_tx
      .send(WorkerMessage::Event(event))
      .await
      .map_err(|_| NotifierError::Closed)
  }

  /// Replace the connection settings (takes effect on the next update).
  pub fn set_config(&self, config: MpdConfig) {
    *self.config.write() = config;
  }

  /// Get the receiver for finished update outcomes.
  ///
  /// At most [`OUTCOME_BACKLOG`] unread outcomes are kept.
  pub fn outcomes(&self) -> Receiver<HandshakeOutcome> {
    self.outcome_rx.clone()
  }

  /// Stop the worker once queued events are handled.
  pub fn close(&self) {
    let _ = self.event_tx.send_blocking(WorkerMessage::Close);
  }
}
