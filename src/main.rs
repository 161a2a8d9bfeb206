use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::io::Write;
use std::path::PathBuf;

use offgrid::control::ControlCommand;
use offgrid::http::{Destination, Request};
use offgrid::{logging, Config, Intercept, Worker};

#[derive(Parser, Debug)]
#[command(name = "offgrid")]
#[command(about = "Offline-first caching layer for web applications")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offgrid/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to a daily-rolling file in this directory instead of stderr
  #[arg(long)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Seed the core store for the configured version
  Install,
  /// Evict stale stores and notify clients
  Activate,
  /// Route one request through the caching strategies
  Fetch {
    url: String,
    #[arg(short, long, default_value = "GET")]
    method: String,
    /// Resource destination (document, image, script, style, font, other)
    #[arg(short, long, default_value = "other")]
    destination: Destination,
    /// Treat as a top-level document load
    #[arg(short, long)]
    navigate: bool,
  },
  /// Send a control command (force-activate, invalidate, refresh, report-version)
  Control { command: ControlCommand },
  /// List stores, or the entries of one store
  Stores { name: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_dir.as_deref())?;

  let config = Config::load(args.config.as_deref())?;
  let worker = Worker::open(config)?;

  match args.command {
    Command::Install => {
      let report = worker.install().await?;
      for url in &report.stored {
        println!("stored  {}", url);
      }
      for (url, reason) in &report.failed {
        println!("failed  {}  ({})", url, reason);
      }
      println!("phase: {:?}", worker.phase());
    }
    Command::Activate => match worker.activate().await {
      Some(report) => {
        for name in &report.evicted {
          println!("evicted {}", name);
        }
        println!(
          "claimed {} clients, notified {}",
          report.claimed, report.notified
        );
        for error in &report.errors {
          println!("error   {}", error);
        }
      }
      None => println!("already active"),
    },
    Command::Fetch {
      url,
      method,
      destination,
      navigate,
    } => {
      let method: Method = method
        .to_uppercase()
        .parse()
        .map_err(|e| eyre!("Invalid method {}: {}", method, e))?;
      let url = worker.config().resolve(&url)?;

      let mut request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url).with_destination(destination)
      };
      request.method = method;

      match worker.handle_request(&request).await {
        Intercept::PassThrough => println!("pass-through: {}", request.url),
        Intercept::Respond(served) => {
          let response = served.response;
          eprintln!(
            "{} {} ({:?})",
            response.status, response.status_text, served.source
          );
          for (name, value) in &response.headers {
            eprintln!("{}: {}", name, value);
          }
          std::io::stdout().write_all(&response.body)?;
        }
      }
    }
    Command::Control { command } => {
      let reply = worker.send_control(command).await?;
      println!("{}", serde_json::to_string_pretty(&reply)?);
    }
    Command::Stores { name } => match name {
      Some(name) => {
        for url in worker.stores().entries(&name).await? {
          println!("{}", url);
        }
      }
      None => {
        let names = worker.stores().names();
        for store in worker.stores().list().await? {
          let marker = if names.contains(&store) { "*" } else { " " };
          println!("{} {}", marker, store);
        }
      }
    },
  }

  Ok(())
}
