//! Authenticated reads against the fantasy sports REST API
//!
//! Every call takes the credential explicitly; the client never refreshes or
//! stores tokens. Obtaining a valid credential is `AuthSession`'s job.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;
use yahoo_auth::Credential;

use crate::constants::{
    BASE_URL, DEFAULT_PLAYER_COUNT, DEFAULT_TIMEOUT_SECS, PLAYER_POSITION, PLAYER_SORT,
    PLAYER_STATUS,
};
use crate::envelope::{Game, PlayerRecord, parse_games, parse_players};
use crate::error::{Error, Result};

/// Page of a player collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPage {
    pub start: u32,
    pub count: u32,
}

impl Default for PlayerPage {
    fn default() -> Self {
        Self {
            start: 0,
            count: DEFAULT_PLAYER_COUNT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FantasyClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl FantasyClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Games of the logged-in user. Used as a connection check.
    pub async fn user_games(&self, credential: &Credential) -> Result<Value> {
        self.get_json(credential, "users;use_login=1/games").await
    }

    /// The currently available game for a game code (e.g. `nfl`).
    pub async fn current_game(&self, credential: &Credential, game_code: &str) -> Result<Game> {
        let body = self
            .get_json(
                credential,
                &format!("games;is_available=1;game_codes={game_code}"),
            )
            .await?;

        parse_games(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoActiveGame(game_code.to_string()))
    }

    /// One page of players for a game, sorted by average rank.
    pub async fn players(
        &self,
        credential: &Credential,
        game_key: &str,
        page: PlayerPage,
    ) -> Result<Vec<PlayerRecord>> {
        let resource = format!(
            "game/{game_key}/players;start={};count={};sort={PLAYER_SORT};status={PLAYER_STATUS};position={PLAYER_POSITION}",
            page.start, page.count
        );
        let body = self.get_json(credential, &resource).await?;
        let players = parse_players(&body)?;
        debug!(game_key, count = players.len(), "parsed player page");
        Ok(players)
    }

    fn resource_url(&self, resource: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), resource);
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::Envelope(format!("invalid request URL {raw}: {e}")))?;
        url.query_pairs_mut().append_pair("format", "json");
        Ok(url)
    }

    #[instrument(skip_all, fields(resource = %resource))]
    async fn get_json(&self, credential: &Credential, resource: &str) -> Result<Value> {
        let url = self.resource_url(resource)?;
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, credential.authorization_header())
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            warn!("fantasy API rejected the access token");
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "fantasy API request failed");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Envelope(format!("invalid JSON body: {e}")))
    }
}
