//! MPD text protocol commands and replies.
//!
//! Reference: https://mpd.readthedocs.io/en/latest/protocol.html

use std::fmt;
use std::path::{Component, Path};

/// Marker contained in the banner MPD sends on connect.
pub const GREETING_MARKER: &[u8] = b"OK MPD";

/// Marker of an accepted command.
pub const OK_MARKER: &[u8] = b"OK";

/// Marker of an acknowledged database update.
pub const UPDATING_DB_MARKER: &[u8] = b"updating_db";

/// Part of the music database to rescan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateScope {
  /// Rescan the whole library.
  Full,
  /// Rescan the subtree at this path, relative to the music directory.
  Path(String),
}

impl UpdateScope {
  /// Pick the scope for a changed library item.
  ///
  /// A path scope is only used with granular updates enabled and a known
  /// item inside the library root; every other case rescans everything.
  pub fn for_item(item: Option<&Path>, library_root: Option<&Path>, granular: bool) -> Self {
    if !granular {
      return UpdateScope::Full;
    }
    let (Some(item), Some(root)) = (item, library_root) else {
      return UpdateScope::Full;
    };

    match relative_path(item, root) {
      Some(relative) => UpdateScope::Path(relative),
      None => {
        log::warn!(
          "{} is not inside the music directory {}, updating everything",
          item.display(),
          root.display()
        );
        UpdateScope::Full
      }
    }
  }
}

impl fmt::Display for UpdateScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UpdateScope::Full => write!(f, "entire library"),
      UpdateScope::Path(path) => write!(f, "{}", path),
    }
  }
}

/// Express `item` relative to `root` with `/` separators.
///
/// Returns `None` when `item` is outside `root` or names the root itself.
pub fn relative_path(item: &Path, root: &Path) -> Option<String> {
  let relative = item.strip_prefix(root).ok()?;
  let parts: Vec<String> = relative
    .components()
    .filter_map(|component| match component {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      Component::ParentDir => Some("..".to_string()),
      _ => None,
    })
    .collect();

  if parts.is_empty() {
    None
  } else {
    Some(parts.join("/"))
  }
}

/// Command sent to MPD.
#[derive(Clone, PartialEq, Eq)]
pub enum MpdCommand {
  Password(String),
  Update(UpdateScope),
  Close,
}

impl MpdCommand {
  /// Encode as a terminated protocol line.
  ///
  /// The password goes out verbatim between quotes, without escaping.
  pub fn to_bytes(&self) -> Vec<u8> {
    match self {
      MpdCommand::Password(password) => {
        let mut line = b"password \"".to_vec();
        line.extend_from_slice(password.as_bytes());
        line.extend_from_slice(b"\"\n");
        line
      }
      MpdCommand::Update(UpdateScope::Full) => b"update\n".to_vec(),
      MpdCommand::Update(UpdateScope::Path(path)) => format!("update {}\n", path).into_bytes(),
      MpdCommand::Close => b"close\n".to_vec(),
    }
  }
}

// Keeps passwords out of logs.
impl fmt::Debug for MpdCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MpdCommand::Password(_) => write!(f, "password \"********\""),
      MpdCommand::Update(UpdateScope::Full) => write!(f, "update"),
      MpdCommand::Update(UpdateScope::Path(path)) => write!(f, "update {}", path),
      MpdCommand::Close => write!(f, "close"),
    }
  }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
  haystack.windows(needle.len()).any(|window| window == needle)
}

/// Check the connect banner.
pub fn is_greeting(line: &[u8]) -> bool {
  contains(line, GREETING_MARKER)
}

/// Check a password reply.
pub fn is_ok(line: &[u8]) -> bool {
  contains(line, OK_MARKER)
}

/// Check an update reply.
pub fn is_updating_db(line: &[u8]) -> bool {
  contains(line, UPDATING_DB_MARKER)
}
