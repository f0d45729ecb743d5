//! Test doubles: a scripted in-memory stream and a loopback MPD server.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Stream that replays scripted chunks, one per read, then reports EOF.
pub struct MockStream {
  chunks: VecDeque<Vec<u8>>,
  written: Arc<Mutex<Vec<u8>>>,
  shutdowns: Arc<AtomicUsize>,
}

/// Observer for what a [`MockStream`] saw after it has been moved away.
#[derive(Clone)]
pub struct MockHandle {
  written: Arc<Mutex<Vec<u8>>>,
  shutdowns: Arc<AtomicUsize>,
}

impl MockStream {
  pub fn new(chunks: &[&[u8]]) -> Self {
    Self {
      chunks: chunks.iter().map(|c| c.to_vec()).collect(),
      written: Arc::new(Mutex::new(Vec::new())),
      shutdowns: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn handle(&self) -> MockHandle {
    MockHandle {
      written: self.written.clone(),
      shutdowns: self.shutdowns.clone(),
    }
  }
}

impl MockHandle {
  pub fn written(&self) -> Vec<u8> {
    self.written.lock().clone()
  }

  pub fn shutdowns(&self) -> usize {
    self.shutdowns.load(Ordering::SeqCst)
  }
}

impl AsyncRead for MockStream {
  fn poll_read(
    self: Pin<&mut Self>,
    _cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
  ) -> Poll<io::Result<()>> {
    let this = self.get_mut();
    if let Some(mut chunk) = this.chunks.pop_front() {
      let n = chunk.len().min(buf.remaining());
      buf.put_slice(&chunk[..n]);
      if n < chunk.len() {
        chunk.drain(..n);
        this.chunks.push_front(chunk);
      }
    }
    Poll::Ready(Ok(()))
  }
}

impl AsyncWrite for MockStream {
  fn poll_write(
    self: Pin<&mut Self>,
    _cx: &mut Context<'_>,
    data: &[u8],
  ) -> Poll<io::Result<usize>> {
    self.written.lock().extend_from_slice(data);
    Poll::Ready(Ok(data.len()))
  }

  fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    Poll::Ready(Ok(()))
  }

  fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    self.shutdowns.fetch_add(1, Ordering::SeqCst);
    Poll::Ready(Ok(()))
  }
}

/// Minimal MPD server on a loopback TCP port.
///
/// Greets every client, accepts any password except `wrong`, acknowledges
/// every update and records each command line it receives.
pub struct FakeMpd {
  pub port: u16,
  commands: Arc<Mutex<Vec<String>>>,
  connections: Arc<AtomicUsize>,
  _accept_handle: JoinHandle<()>,
}

impl FakeMpd {
  pub async fn spawn() -> Self {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));

    let accept_commands = commands.clone();
    let accept_connections = connections.clone();
    let accept_handle = tokio::spawn(async move {
      while let Ok((stream, _)) = listener.accept().await {
        accept_connections.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(serve(stream, accept_commands.clone()));
      }
    });

    Self {
      port,
      commands,
      connections,
      _accept_handle: accept_handle,
    }
  }

  pub fn commands(&self) -> Vec<String> {
    self.commands.lock().clone()
  }

  /// Wait until at least `count` commands arrived, then return them.
  pub async fn wait_for(&self, count: usize) -> Vec<String> {
    for _ in 0..200 {
      let commands = self.commands();
      if commands.len() >= count {
        return commands;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    self.commands()
  }

  pub fn connections(&self) -> usize {
    self.connections.load(Ordering::SeqCst)
  }
}

/// Serve one client connection until it sends `close` or hangs up.
pub async fn serve<S>(stream: S, commands: Arc<Mutex<Vec<String>>>)
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  let (reader, mut writer) = tokio::io::split(stream);
  let mut reader = BufReader::new(reader);
  if writer.write_all(b"OK MPD 0.23.5\n").await.is_err() {
    return;
  }

  let mut line = String::new();
  loop {
    line.clear();
    match reader.read_line(&mut line).await {
      Ok(0) | Err(_) => break,
      Ok(_) => {}
    }
    let command = line.trim_end_matches('\n').to_string();
    commands.lock().push(command.clone());

    let reply: &[u8] = if command == "close" {
      break;
    } else if command == "password \"wrong\"" {
      b"ACK [3@0] {password} incorrect password\n"
    } else if command.starts_with("password ") {
      b"OK\n"
    } else if command.starts_with("update") {
      b"updating_db: 1\nOK\n"
    } else {
      b"ACK [5@0] {} unknown command\n"
    };
    if writer.write_all(reply).await.is_err() {
      break;
    }
  }
}
