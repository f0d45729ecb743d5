//! One-shot MPD database update session.
//!
//! Each run opens a fresh connection, walks the handshake in order
//! (greeting, optional password, update, close) and always releases the
//! socket before returning.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use super::protocol::{self, MpdCommand, UpdateScope};
use super::socket::{Endpoint, LineSocket};
use crate::config::MpdConfig;

/// Result of an update session.
///
/// Failures are ordinary outcomes rather than errors: a failed MPD update
/// never aborts the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
  /// Connection is open and the handshake is still in progress.
  Connected,
  /// The transport could not connect.
  ConnectFailed(String),
  /// The first line was not an MPD banner.
  BadGreeting(Vec<u8>),
  /// MPD rejected the password.
  AuthFailed(Vec<u8>),
  /// MPD did not acknowledge the update.
  UpdateFailed(Vec<u8>),
  /// The configured session timeout expired.
  TimedOut,
  /// The update was acknowledged.
  Success,
}

impl HandshakeOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, HandshakeOutcome::Success)
  }

  /// Whether the session has reached its final state.
  pub fn is_terminal(&self) -> bool {
    !matches!(self, HandshakeOutcome::Connected)
  }
}

impl fmt::Display for HandshakeOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HandshakeOutcome::Connected => write!(f, "Connected"),
      HandshakeOutcome::ConnectFailed(reason) => write!(f, "MPD connection failed: {}", reason),
      HandshakeOutcome::BadGreeting(raw) => {
        write!(f, "MPD connection failed: {}", raw.escape_ascii())
      }
      HandshakeOutcome::AuthFailed(raw) => {
        write!(f, "Authentication failed: {}", raw.escape_ascii())
      }
      HandshakeOutcome::UpdateFailed(raw) => {
        write!(f, "Update failed: {}", raw.escape_ascii())
      }
      HandshakeOutcome::TimedOut => write!(f, "MPD session timed out"),
      HandshakeOutcome::Success => write!(f, "Database updated"),
    }
  }
}

/// Issues `update` commands to one MPD server.
#[derive(Clone)]
pub struct UpdateSession {
  endpoint: Endpoint,
  password: Option<String>,
  timeout: Option<Duration>,
}

impl fmt::Debug for UpdateSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("UpdateSession")
      .field("endpoint", &self.endpoint)
      .field("password", &self.password.as_ref().map(|_| "********"))
      .field("timeout", &self.timeout)
      .finish()
  }
}

impl UpdateSession {
  /// Create a session from connection settings.
  pub fn new(config: &MpdConfig) -> Self {
    Self {
      endpoint: Endpoint::from_host(&config.host, config.port),
      password: Some(config.password.clone()).filter(|p| !p.is_empty()),
      timeout: config.timeout_secs.map(Duration::from_secs),
    }
  }

  /// Limit how long a whole session may take.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Where this session connects.
  pub fn endpoint(&self) -> &Endpoint {
    &self.endpoint
  }

  /// Connect, ask MPD to rescan `scope` and disconnect.
  pub async fn run(&self, scope: &UpdateScope) -> HandshakeOutcome {
    log::info!("Updating MPD database...");

    let outcome = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, self.connect_and_run(scope)).await {
        Ok(outcome) => outcome,
        Err(_) => {
          log::error!("MPD session timeout after {:?} at {}", limit, self.endpoint);
          HandshakeOutcome::TimedOut
        }
      },
      None => self.connect_and_run(scope).await,
    };

    if outcome.is_success() {
      log::info!("Database updated.");
    } else {
      log::warn!("{}", outcome);
    }
    outcome
  }

  async fn connect_and_run(&self, scope: &UpdateScope) -> HandshakeOutcome {
    let socket = match LineSocket::open(&self.endpoint).await {
      Ok(socket) => socket,
      Err(e) => return HandshakeOutcome::ConnectFailed(e.to_string()),
    };
    log::debug!("Connected to MPD at {}", self.endpoint());

    self.run_on(socket, scope).await
  }

  /// Drive the handshake over an already connected socket.
  ///
  /// The socket is closed exactly once, whichever step fails.
  pub async fn run_on<S>(&self, mut socket: LineSocket<S>, scope: &UpdateScope) -> HandshakeOutcome
  where
    S: AsyncRead + AsyncWrite + Unpin,
  {
    let mut outcome = HandshakeOutcome::Connected;

    let greeting = receive(&mut socket).await;
    if !protocol::is_greeting(&greeting) {
      release(socket).await;
      return HandshakeOutcome::BadGreeting(greeting);
    }

    if let Some(password) = &self.password {
      transmit(&mut socket, &MpdCommand::Password(password.clone())).await;
      let reply = receive(&mut socket).await;
      if !protocol::is_ok(&reply) {
        transmit(&mut socket, &MpdCommand::Close).await;
        release(socket).await;
        return HandshakeOutcome::AuthFailed(reply);
      }
    }

    log::info!("Updating {}", scope);
    transmit(&mut socket, &MpdCommand::Update(scope.clone())).await;
    let reply = receive(&mut socket).await;
    if !protocol::is_updating_db(&reply) {
      outcome = HandshakeOutcome::UpdateFailed(reply);
    }

    transmit(&mut socket, &MpdCommand::Close).await;
    release(socket).await;

    if !outcome.is_terminal() {
      outcome = HandshakeOutcome::Success;
    }
    outcome
  }
}

// I/O failures mid-session read as an empty reply, which the next check
// turns into the matching failure outcome.
async fn receive<S>(socket: &mut LineSocket<S>) -> Vec<u8>
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  match socket.read_line().await {
    Ok(line) => {
      log::debug!("MPD < {}", line.escape_ascii());
      line
    }
    Err(e) => {
      log::warn!("MPD read error: {}", e);
      Vec::new()
    }
  }
}

async fn transmit<S>(socket: &mut LineSocket<S>, command: &MpdCommand)
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  log::debug!("MPD > {:?}", command);
  if let Err(e) = socket.send(&command.to_bytes()).await {
    log::warn!("MPD write error: {}", e);
  }
}

async fn release<S>(socket: LineSocket<S>)
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  if let Err(e) = socket.close().await {
    log::debug!("MPD socket close error: {}", e);
  }
}
