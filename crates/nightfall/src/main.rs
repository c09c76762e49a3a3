//! The `nightfall-server` binary.
//!
//! Environment:
//! - `SERVER_PORT`: port to listen on (default 50051)
//! - `NIGHTFALL_ROUND_TIMEOUT_SECS`: abandon a session when a player waits
//!   longer than this at a barrier (default: wait forever)
//! - `RUST_LOG`: log filter (default `info`)

use std::time::Duration;

use nightfall::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 50051;

#[tokio::main]
async fn main() -> Result<(), NightfallError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = env_parse::<u16>("SERVER_PORT").unwrap_or(DEFAULT_PORT);

    let game_config = match env_parse::<u64>("NIGHTFALL_ROUND_TIMEOUT_SECS") {
        Some(secs) => GameConfig::with_round_timeout(Duration::from_secs(secs)),
        None => GameConfig::default(),
    };
    tracing::info!(port, round_timeout = ?game_config.round_timeout, "starting");

    let server = NightfallServer::builder()
        .bind(&format!("0.0.0.0:{port}"))
        .game_config(game_config)
        .build()
        .await?;

    server.run().await
}

/// Reads and parses an environment variable. Unparseable values are
/// logged and ignored.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}
