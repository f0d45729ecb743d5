//! MPD client module - asks a Music Player Daemon to rescan its database.
//!
//! Architecture:
//! - `socket.rs` - TCP/Unix socket connection with line framing
//! - `protocol.rs` - Command encoding, reply markers and update scopes
//! - `session.rs` - Greeting, password, update and close handshake
//! - `error.rs` - Transport error types

mod error;
mod protocol;
mod session;
mod socket;

#[cfg(test)]
pub(crate) mod testing;

pub use error::SocketError;
pub use protocol::{relative_path, MpdCommand, UpdateScope};
pub use session::{HandshakeOutcome, UpdateSession};
pub use socket::{Connection, Endpoint, LineSocket, Transport};
