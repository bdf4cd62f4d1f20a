use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rentals::commands;
use rentals::config::AppConfig;
use rentals::db::Database;
use rentals::services::crypto::CryptoService;
use rentals::services::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "rentals")]
#[command(about = "Rental income tracker with Danish bundfradrag tax estimates")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a PBKDF2 hash for APP_PASSWORD_HASH
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Some(Command::HashPassword { password }) = Args::parse().command {
        println!("{}", CryptoService::hash_password(&password)?);
        return Ok(());
    }

    let config = AppConfig::load()?;
    init_tracing(&config.log_level);

    let db = Database::new(PathBuf::from(&config.database_path))
        .with_context(|| format!("Open database {}", config.database_path))?;
    db.ensure_apartments()?;

    if config.session_secret().is_none() {
        tracing::warn!("APP_SESSION_SECRET is not set, logins will fail");
    }

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, database = %config.database_path, "Listening");

    let state = AppState::new(db, config);
    axum::serve(listener, commands::router(state)).await?;
    Ok(())
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
