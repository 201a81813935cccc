//! Glyph prediction server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), loads every
//! configured classifier backend whose artifact is present, opens the
//! configured prediction store, and serves the HTTP API.
//!
//! # Password hash generation
//!
//! To print an argon2 PHC string for hand-editing `users.json`:
//!
//! ```
//! cargo run -p glyph-server --bin server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use glyph_core::{classifier::BackendRegistry, store::PredictionStore};
use glyph_predict::Orchestrator;
use glyph_report::ShareSigner;
use glyph_server::{AppState, ServerConfig, StoreBackend, auth::UserDirectory, links::ShareLinks};
use glyph_store_file::FileStore;
use glyph_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Glyph digit prediction server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let hash = glyph_server::auth::hash_password(&password)
      .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("GLYPH"))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  server_cfg.store_path = expand_tilde(&server_cfg.store_path);
  server_cfg.users_path = expand_tilde(&server_cfg.users_path);
  server_cfg.shares_path = expand_tilde(&server_cfg.shares_path);
  for backend in &mut server_cfg.backends {
    backend.path = expand_tilde(&backend.path);
  }

  // Inference backends. Loading is CPU-bound and may take a while.
  let specs = server_cfg.backends.clone();
  let registry = tokio::task::spawn_blocking(move || glyph_onnx::load_registry(&specs))
    .await
    .context("backend loading panicked")?;
  tracing::info!(backends = registry.len(), "backend registry ready");

  let users = UserDirectory::open(&server_cfg.users_path)
    .with_context(|| format!("failed to open user directory at {:?}", server_cfg.users_path))?;
  let signer = ShareSigner::new(&server_cfg.share_secret).context("invalid share_secret")?;
  let links = ShareLinks::open(&server_cfg.shares_path, signer)
    .with_context(|| format!("failed to open share links at {:?}", server_cfg.shares_path))?;

  match server_cfg.store_backend {
    StoreBackend::File => {
      let store = FileStore::open(&server_cfg.store_path)
        .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;
      serve(store, registry, users, links, server_cfg).await
    }
    StoreBackend::Sqlite => {
      let store = SqliteStore::open(&server_cfg.store_path)
        .await
        .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;
      serve(store, registry, users, links, server_cfg).await
    }
  }
}

async fn serve<S>(
  store:    S,
  registry: BackendRegistry,
  users:    UserDirectory,
  links:    ShareLinks,
  cfg:      ServerConfig,
) -> anyhow::Result<()>
where
  S: PredictionStore + 'static,
{
  tracing::info!(
    backend = ?cfg.store_backend,
    "prediction log at {}",
    cfg.store_path.display(),
  );

  let address = format!("{}:{}", cfg.host, cfg.port);
  let state = AppState::new(Orchestrator::new(registry, Arc::new(store)), users, links, cfg)?;
  let app = glyph_server::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
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
