//! Command-line entry point: asks MPD to rescan after library changes.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mpd_update::{AppConfig, LibraryEvent, MpdConfig, UpdateNotifier};

#[derive(Parser, Debug)]
#[command(name = "mpd-update", version, about = "Ask MPD to rescan its music database")]
struct Cli {
  /// JSON config file with an `mpd` section.
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// MPD host, or a Unix socket path starting with `/` or `~`.
  #[arg(long)]
  host: Option<String>,

  /// MPD port.
  #[arg(long)]
  port: Option<u16>,

  /// MPD password.
  #[arg(long)]
  password: Option<String>,

  /// Rescan only the changed paths instead of the whole library.
  #[arg(long)]
  granular: bool,

  /// Music library root.
  #[arg(long)]
  music_dir: Option<PathBuf>,

  /// Give up on the session after this many seconds.
  #[arg(long)]
  timeout: Option<u64>,

  /// Changed library items (absolute paths).
  paths: Vec<PathBuf>,
}

impl Cli {
  fn into_config(self) -> Result<(MpdConfig, Vec<PathBuf>), String> {
    let mut config = match &self.config {
      Some(path) => AppConfig::load(path).map_err(|e| e.to_string())?.mpd,
      None => MpdConfig::default(),
    };

    if let Some(host) = self.host {
      config.host = host;
    }
    if let Some(port) = self.port {
      config.port = port;
    }
    if let Some(password) = self.password {
      config.password = password;
    }
    if self.granular {
      config.granular_update = true;
    }
    if let Some(music_dir) = self.music_dir {
      config.music_directory = Some(music_dir);
    }
    if let Some(timeout) = self.timeout {
      config.timeout_secs = Some(timeout);
    }

    config.validate()?;
    Ok((config, self.paths))
  }
}

#[tokio::main]
async fn main() -> ExitCode {
  mpd_update::init_logging();

  let (config, paths) = match Cli::parse().into_config() {
    Ok(parsed) => parsed,
    Err(e) => {
      log::error!("{}", e);
      return ExitCode::FAILURE;
    }
  };
  log::debug!("Using {:?}", config);

  let notifier = UpdateNotifier::spawn(config);
  let mut changes: Vec<Option<PathBuf>> = paths.into_iter().map(Some).collect();
  if changes.is_empty() {
    changes.push(None);
  }

  for path in changes {
    if let Err(e) = notifier.notify(LibraryEvent::DatabaseChange { path }).await {
      log::error!("{}", e);
      return ExitCode::FAILURE;
    }
  }
  if let Err(e) = notifier.notify(LibraryEvent::BatchComplete).await {
    log::error!("{}", e);
    return ExitCode::FAILURE;
  }

  let outcome = notifier.outcomes().recv().await;
  notifier.close();

  match outcome {
    Ok(outcome) if outcome.is_success() => ExitCode::SUCCESS,
    Ok(_) => ExitCode::FAILURE,
    Err(_) => {
      log::error!("Update worker stopped before reporting");
      ExitCode::FAILURE
    }
  }
}
