//! Yahoo fantasy sports player fetcher
//!
//! Single binary that:
//! 1. Obtains a valid OAuth2 credential (stored, refreshed, or freshly authorized)
//! 2. Looks up the currently available game for the configured sport
//! 3. Fetches a page of players and prints it
//! 4. Optionally writes a JSON snapshot or CSV export of the page

mod config;
mod prompt;
mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fantasy_api::{FantasyClient, PlayerPage, Snapshot};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use yahoo_auth::{
    AuthSession, AuthorizationFlow, CodeDelivery, CodePrompt, Credential, OAuthClient, TokenState,
    TokenStore, unix_millis,
};

use crate::config::Config;
use crate::prompt::{StdinPrompt, SystemBrowser};

#[derive(Parser)]
#[command(name = "fantasy-players", about = "Yahoo fantasy sports player data fetcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to FANTASY_CONFIG, then ./fantasy-players.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when neither LOG_LEVEL nor RUST_LOG is set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authorization flow and store a new credential.
    Login,
    /// Show the stored credential's state without contacting Yahoo.
    Status,
    /// Delete the stored credential.
    Logout,
    /// Verify API access by listing the logged-in user's games.
    Check,
    /// Fetch players for the current game.
    Players {
        /// Players per page.
        #[arg(long, default_value_t = fantasy_api::constants::DEFAULT_PLAYER_COUNT)]
        count: u32,
        /// Offset into the ranked player list.
        #[arg(long, default_value_t = 0)]
        start: u32,
        /// Also write the page to the snapshot directory.
        #[arg(long, default_value_t = false)]
        snapshot: bool,
        /// Also write the page as CSV to the export directory.
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
}

/// Logs go to stderr; stdout carries only command output.
fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path, explicit)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let store = TokenStore::new(&config.storage.token_path);

    match cli.command {
        Commands::Login => {
            let session = build_session(&config, store)?;
            let credential = accept_unsaved(session.authorize().await)?;
            println!(
                "Logged in; token valid for {} minutes",
                credential.remaining_millis(unix_millis()) / 60_000
            );
        }
        Commands::Status => {
            let state = match store.load().await {
                Ok(stored) => TokenState::classify(
                    stored,
                    unix_millis(),
                    Duration::from_secs(config.oauth.refresh_margin_secs),
                ),
                Err(yahoo_auth::Error::CorruptState(msg)) => {
                    println!("{}: unreadable ({msg})", store.path().display());
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            println!(
                "{}: {}",
                store.path().display(),
                report::token_status(&state, unix_millis())
            );
        }
        Commands::Logout => {
            if store.clear().await? {
                println!("Removed {}", store.path().display());
            } else {
                println!("No stored credential at {}", store.path().display());
            }
        }
        Commands::Check => {
            let session = build_session(&config, store)?;
            let credential = accept_unsaved(session.ensure_token().await)?;
            let games = api_client(&config)
                .user_games(&credential)
                .await
                .context("API connection check failed")?;
            println!("{}", serde_json::to_string_pretty(&games)?);
        }
        Commands::Players {
            count,
            start,
            snapshot,
            csv,
        } => {
            let session = build_session(&config, store)?;
            let credential = accept_unsaved(session.ensure_token().await)?;
            let api = api_client(&config);

            let game = api
                .current_game(&credential, &config.api.game_code)
                .await
                .context("failed to look up the current game")?;
            info!(game_key = %game.game_key, season = game.season, "found current game");

            let players = api
                .players(&credential, &game.game_key, PlayerPage { start, count })
                .await
                .context("failed to fetch players")?;
            print!("{}", report::player_table(&game, start, &players));

            if snapshot {
                let timestamp = unix_millis() / 1000;
                let path = Snapshot::new(game.season, timestamp, &players)
                    .write_to(&config.storage.snapshot_dir)
                    .await?;
                println!("Saved snapshot to {}", path.display());
            }
            if csv {
                let timestamp = unix_millis() / 1000;
                let path = Snapshot::new(game.season, timestamp, &players)
                    .write_csv_to(&config.storage.export_dir)
                    .await?;
                println!("Exported CSV to {}", path.display());
            }
        }
    }

    Ok(())
}

fn build_session(config: &Config, store: TokenStore) -> Result<AuthSession> {
    let settings = config.oauth_settings()?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let oauth = OAuthClient::new(http, settings);

    let prompt: Arc<dyn CodePrompt> = Arc::new(StdinPrompt);
    let delivery = match &config.callback {
        Some(callback) => CodeDelivery::Callback {
            settings: callback.settings(),
            fallback: callback.fallback_to_manual.then(|| prompt.clone()),
        },
        None => CodeDelivery::Manual(prompt),
    };
    let flow = AuthorizationFlow::new(Arc::new(SystemBrowser), delivery).with_timeout(
        Duration::from_secs(config.oauth.authorization_timeout_secs),
    );

    Ok(AuthSession::new(store, oauth, flow)
        .with_refresh_margin(Duration::from_secs(config.oauth.refresh_margin_secs)))
}

fn api_client(config: &Config) -> FantasyClient {
    FantasyClient::new(reqwest::Client::new())
        .with_base_url(&config.api.base_url)
        .with_timeout(Duration::from_secs(config.api.timeout_secs))
}

/// A credential that was obtained but could not be saved is still good for
/// this run; continue with it and warn.
fn accept_unsaved(result: yahoo_auth::Result<Credential>) -> Result<Credential> {
    match result {
        Ok(credential) => Ok(credential),
        Err(e @ yahoo_auth::Error::Persistence { .. }) => {
            let reason = e.to_string();
            match e.into_unsaved() {
                Ok(credential) => {
                    warn!(error = %reason, "continuing with a credential that was not saved");
                    Ok(credential)
                }
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}
