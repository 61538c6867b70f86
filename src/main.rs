mod agent;
mod cache;
mod config;
mod error;
mod http;
mod logging;
mod network;
#[cfg(test)]
mod testing;
mod trigger;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use agent::{Agent, StateFile};
use cache::{CacheStorage, SqliteStorage};
use config::Config;
use http::Request;
use network::HttpFetcher;
use trigger::{Trigger, TriggerOutcome};

#[derive(Parser, Debug)]
#[command(name = "offcache")]
#[command(about = "An offline caching agent for web apps")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Generation label to use instead of the configured one
  #[arg(short, long)]
  generation: Option<String>,

  /// Log debug output
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install the current generation and activate it
  Setup,
  /// Delete stores of superseded generations and claim clients
  Upgrade,
  /// Answer a request the way an intercepted page request is answered
  Fetch {
    url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    data: Option<String>,

    /// Write the body here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Show the active generation and all stores
  Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override generation if specified on command line
  let config = match args.generation {
    Some(generation) => config.with_generation(generation)?,
    None => config,
  };

  let _log_guard = logging::init(args.verbose, config.logging.file.as_deref())?;

  let storage = Arc::new(SqliteStorage::open(&config.store_path()?)?);
  let fetcher = Arc::new(HttpFetcher::new(
    config.timeout(),
    config.network.user_agent.as_deref(),
  )?);
  let state = Arc::new(StateFile::new(config.state_path()?));
  let agent = Agent::new(
    config.agent_settings()?,
    Arc::clone(&storage),
    fetcher,
    state.clone(),
  );

  match args.command {
    Command::Setup => {
      report(agent.dispatch(Trigger::Setup).await?, None)?;
      // Setup skips the waiting phase, so activation follows at once
      report(agent.dispatch(Trigger::Upgrade).await?, None)?;
    }
    Command::Upgrade => {
      report(agent.dispatch(Trigger::Upgrade).await?, None)?;
    }
    Command::Fetch {
      url,
      method,
      headers,
      data,
      output,
    } => {
      let request = build_request(&url, &method, &headers, data)?;
      fetch(&agent, request, output.as_deref()).await?;
    }
    Command::Status => {
      status(&config, storage.as_ref(), &state).await?;
    }
  }

  Ok(())
}

fn build_request(url: &str, method: &str, headers: &[String], data: Option<String>) -> Result<Request> {
  let url = Url::parse(url).map_err(|e| eyre!("Invalid URL '{}': {}", url, e))?;
  let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
    .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;

  let mut request = Request::new(method, url);
  for header in headers {
    let (name, value) = header
      .split_once(':')
      .ok_or_else(|| eyre!("Header must look like 'Name: value', got '{}'", header))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
      .map_err(|e| eyre!("Invalid header name '{}': {}", name, e))?;
    let value = HeaderValue::from_str(value.trim())
      .map_err(|e| eyre!("Invalid header value for {}: {}", name, e))?;
    request = request.with_header(name, value);
  }
  if let Some(data) = data {
    request = request.with_body(data);
  }

  Ok(request)
}

/// Deliver the response for `request`, then keep the trigger alive until its
/// store writes have landed.
async fn fetch<S: CacheStorage>(agent: &Agent<S>, request: Request, output: Option<&Path>) -> Result<()> {
  let delivered = match agent.dispatch(Trigger::Intercept(request)).await {
    Ok(outcome) => report(outcome, output),
    Err(e) => Err(e.into()),
  };
  agent.settle().await;
  delivered
}

fn report(outcome: TriggerOutcome, output: Option<&Path>) -> Result<()> {
  match outcome {
    TriggerOutcome::Installed(setup) => {
      println!(
        "Installed {} ({} assets cached)",
        setup.generation, setup.preloaded
      );
    }
    TriggerOutcome::Activated(upgrade) => {
      for label in &upgrade.deleted {
        println!("Deleted old store {}", label);
      }
      for (label, error) in &upgrade.failed {
        eprintln!("Could not delete old store {}: {}", label, error);
      }
      if upgrade.is_clean() {
        println!("Activated");
      } else {
        println!("Activated ({} old stores left for the next upgrade)", upgrade.failed.len());
      }
    }
    TriggerOutcome::Responded(served) => {
      eprintln!("{} ({})", served.response.status, served.source);
      let body = served.response.into_body();
      match output {
        Some(path) => std::fs::write(path, &body)
          .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?,
        None => std::io::stdout().lock().write_all(&body)?,
      }
    }
  }
  Ok(())
}

async fn status(config: &Config, storage: &SqliteStorage, state: &StateFile) -> Result<()> {
  let current = state.load().await?;

  println!("Configured generation: {}", config.generation);
  println!(
    "Active generation:     {}",
    current.active.as_deref().unwrap_or("-")
  );
  if let Some(at) = current.claimed_at {
    println!("Clients claimed at:    {}", at.to_rfc3339());
  }
  println!("State file:            {}", state.path().display());
  println!();

  let labels = storage.labels().await?;
  if labels.is_empty() {
    println!("No stores");
    return Ok(());
  }

  for label in labels {
    let marker = if label == config.generation { "*" } else { " " };
    let count = storage.entry_count(&label).await?;
    println!("{} {:<24} {} entries", marker, label, count);
  }

  Ok(())
}
