//! Line-framed socket connection to MPD.
//!
//! Handles platform-specific connections (TCP everywhere, Unix sockets on
//! Linux/macOS) and splits the byte stream into newline-terminated lines.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::error::SocketError;

/// Bytes pulled from the transport per receive call.
const READ_CHUNK: usize = 1024;

/// Line terminator of the MPD protocol.
pub const TERMINATOR: u8 = b'\n';

/// Where to reach the MPD server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
  Tcp { host: String, port: u16 },
  Unix { path: PathBuf },
}

impl Endpoint {
  /// Resolve a configured host value.
  ///
  /// Hosts starting with `/` or `~` name a Unix socket (with `~` and
  /// `~user` expanded to home directories); anything else is a TCP hostname.
  pub fn from_host(host: &str, port: u16) -> Self {
    if host.starts_with('/') || host.starts_with('~') {
      Endpoint::Unix {
        path: expand_home(host),
      }
    } else {
      Endpoint::Tcp {
        host: host.to_string(),
        port,
      }
    }
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
      Endpoint::Unix { path } => write!(f, "{}", path.display()),
    }
  }
}

fn expand_home(path: &str) -> PathBuf {
  let Some(tail) = path.strip_prefix('~') else {
    return PathBuf::from(path);
  };
  let (user, rest) = match tail.find('/') {
    Some(slash) => (&tail[..slash], tail[slash..].trim_start_matches('/')),
    None => (tail, ""),
  };

  let home = if user.is_empty() {
    dirs::home_dir()
  } else {
    user_home(user)
  };

  match home {
    Some(home) if rest.is_empty() => home,
    Some(home) => home.join(rest),
    None => {
      log::warn!("No home directory found, using socket path {} as-is", path);
      PathBuf::from(path)
    }
  }
}

/// Home directory of a named account, looked up through NSS.
#[cfg(unix)]
fn user_home(name: &str) -> Option<PathBuf> {
  use uzers::os::unix::UserExt;

  uzers::get_user_by_name(name).map(|user| user.home_dir().to_path_buf())
}

#[cfg(not(unix))]
fn user_home(_name: &str) -> Option<PathBuf> {
  None
}

/// Any bidirectional byte stream usable as a transport.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Transport opened from an [`Endpoint`].
pub type Connection = Box<dyn Transport>;

/// Socket wrapper that allows reading by line.
pub struct LineSocket<S> {
  stream: S,
  buf: Vec<u8>,
}

impl LineSocket<Connection> {
  /// Connect to MPD over TCP or a Unix socket.
  pub async fn open(endpoint: &Endpoint) -> Result<Self, SocketError> {
    let stream: Connection = match endpoint {
      Endpoint::Tcp { host, port } => {
        let stream = TcpStream::connect((host.as_str(), *port))
          .await
          .map_err(|e| SocketError::ConnectionFailed(e.to_string()))?;
        Box::new(stream)
      }
      Endpoint::Unix { path } => connect_unix(path).await?,
    };

    Ok(Self::new(stream))
  }
}

#[cfg(unix)]
async fn connect_unix(path: &Path) -> Result<Connection, SocketError> {
  use tokio::net::UnixStream;

  let stream = UnixStream::connect(path)
    .await
    .map_err(|e| SocketError::ConnectionFailed(format!("{}: {}", path.display(), e)))?;
  Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn connect_unix(path: &Path) -> Result<Connection, SocketError> {
  Err(SocketError::UnsupportedEndpoint(format!(
    "Unix sockets are not available on this platform: {}",
    path.display()
  )))
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineSocket<S> {
  /// Wrap an already connected stream.
  pub fn new(stream: S) -> Self {
    Self {
      stream,
      buf: Vec::new(),
    }
  }

  /// Read the next line, terminator included.
  ///
  /// Returns an empty vector when the stream ends before a full line
  /// arrives; any partial line stays buffered.
  pub async fn read_line(&mut self) -> Result<Vec<u8>, SocketError> {
    let mut chunk = [0u8; READ_CHUNK];
    let mut scanned = 0;

    loop {
      if let Some(pos) = self.buf[scanned..].iter().position(|&b| b == TERMINATOR) {
        let end = scanned + pos + 1;
        return Ok(self.buf.drain(..end).collect());
      }
      scanned = self.buf.len();

      let n = self.stream.read(&mut chunk).await?;
      if n == 0 {
        return Ok(Vec::new());
      }
      self.buf.extend_from_slice(&chunk[..n]);
    }
  }

  /// Write raw bytes. Callers include the terminator themselves.
  pub async fn send(&mut self, data: &[u8]) -> Result<(), SocketError> {
    self.stream.write_all(data).await?;
    self.stream.flush().await?;
    Ok(())
  }

  /// Bytes received but not yet returned as a line.
  pub fn buffered(&self) -> &[u8] {
    &self.buf
  }

  /// Shut the connection down.
  pub async fn close(mut self) -> Result<(), SocketError> {
    self.stream.shutdown().await?;
    Ok(())
  }
}
