//! MPD transport error types.

use thiserror::Error;

/// Errors raised by the line socket transport.
///
/// Protocol-level rejections (bad greeting, wrong password, refused update)
/// are not errors; see [`HandshakeOutcome`](super::HandshakeOutcome).
#[derive(Error, Debug)]
pub enum SocketError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Unsupported endpoint: {0}")]
  UnsupportedEndpoint(String),
}
