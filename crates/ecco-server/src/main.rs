//! ecco-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite statistics store, and either serves the API over HTTP or imports a
//! CSV file into one dataset.
//!
//! ```text
//! ecco-server serve
//! ecco-server import county/rfandscreening places.csv
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ecco_core::{Catalog, Engine, GeographyFamily};
use ecco_server::{ServerConfig, import::import_csv};
use ecco_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "ECCO statistics API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Load a long-format CSV file into one dataset.
  Import {
    /// Target dataset as `family/category`, e.g. `county/rfandscreening`.
    dataset: String,
    /// CSV file in the `as-csv` layout.
    file:    PathBuf,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to read config from {:?}", cli.config))?;

  let catalog = server_cfg
    .catalog()
    .context("failed to load measure catalog")?;

  // Expand `~` in store path.
  let database_path = expand_tilde(&server_cfg.database_path);

  // Open SQLite store.
  let store = SqliteStore::open(&database_path, &catalog)
    .await
    .with_context(|| format!("failed to open store at {database_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&server_cfg, store, catalog).await,
    Command::Import { dataset, file } => import(&store, &catalog, &dataset, &file).await,
  }
}

async fn serve(
  server_cfg: &ServerConfig,
  store: SqliteStore,
  catalog: Catalog,
) -> anyhow::Result<()> {
  let engine = Engine::new(
    Arc::new(store),
    Arc::new(catalog),
    server_cfg.query_settings(),
  );
  let app = ecco_server::router(engine);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}/stats");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn import(
  store: &SqliteStore,
  catalog: &Catalog,
  target: &str,
  file: &Path,
) -> anyhow::Result<()> {
  let (family, category) = target
    .split_once('/')
    .with_context(|| format!("expected family/category, got {target:?}"))?;
  let family = GeographyFamily::parse(family)?;
  let dataset = catalog
    .dataset(family, category)
    .with_context(|| format!("no category {category:?} in family {family}"))?;

  let reader = std::fs::File::open(file)
    .with_context(|| format!("failed to open {}", file.display()))?;
  let summary = import_csv(store, dataset, reader)
    .await
    .with_context(|| format!("failed to import {}", file.display()))?;

  println!(
    "imported {} rows and {} geographies into {target}",
    summary.rows, summary.geographies
  );
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
