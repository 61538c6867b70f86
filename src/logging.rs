//! Tracing setup for the binary.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// The filter comes from `OFFCACHE_LOG`, then `RUST_LOG`, then the verbosity
/// flag. With `file` set, logs go there through a non-blocking writer whose
/// guard must be held until exit; otherwise they go to stderr.
pub fn init(verbose: bool, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let default_level = if verbose { "debug" } else { "info" };
  let filter = std::env::var("OFFCACHE_LOG")
    .or_else(|_| std::env::var("RUST_LOG"))
    .map(EnvFilter::new)
    .unwrap_or_else(|_| EnvFilter::new(format!("offcache={}", default_level)));

  match file {
    Some(path) => {
      let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      if let Some(dir) = dir {
        std::fs::create_dir_all(dir)
          .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      }

      let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;

      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;

      Ok(None)
    }
  }
}
