//! Discord REST API client.
//!
//! Only the handful of endpoints the channel creator needs are covered:
//! who am I, look up a guild, list its channels and create a text channel.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::DiscordError;

/// Base URL for the Discord REST API v10.
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord asks bots to identify themselves this way.
const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/chanbridge/chanbridge, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Channel type of a plain guild text channel.
pub const GUILD_TEXT: u8 = 0;

/// The account the bot is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotUser {
    pub id: String,
    pub username: String,
}

/// A guild, Discord's name for a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

/// A channel inside a guild.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuildChannel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
}

/// The remote operations the channel creator depends on.
#[async_trait]
pub trait ChatService {
    /// Log in and return the bot's own account.
    async fn connect(&mut self) -> Result<BotUser, DiscordError>;

    /// Look up a workspace; `None` if it does not exist or the bot is not in it.
    async fn find_workspace(&self, id: u64) -> Result<Option<Guild>, DiscordError>;

    /// Names of the workspace's text channels.
    async fn text_channels(&self, guild: &Guild) -> Result<Vec<String>, DiscordError>;

    /// Create a text channel; Discord may adjust the name it is given.
    async fn create_text_channel(
        &self,
        guild: &Guild,
        name: &str,
    ) -> Result<GuildChannel, DiscordError>;

    /// End the session. Further calls fail with [`DiscordError::Closed`].
    async fn close(&mut self);
}

/// HTTP client for the Discord REST API, authenticated with a bot token.
pub struct DiscordApiClient {
    http: Client,
    token: String,
    base_url: String,
    closed: bool,
}

impl DiscordApiClient {
    /// Create a new client with the given bot token.
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DISCORD_API_BASE.to_owned())
    }

    /// Create a client pointing at a custom base URL.
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            token,
            base_url,
            closed: false,
        }
    }

    /// Return the base URL used for API requests.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, DiscordError> {
        if self.closed {
            return Err(DiscordError::Closed);
        }
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
            .header("User-Agent", USER_AGENT))
    }
}

/// Turn a non-success response into the matching [`DiscordError`].
async fn check_status(resp: Response) -> Result<Response, DiscordError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".into());
    Err(match status {
        StatusCode::UNAUTHORIZED => DiscordError::InvalidToken,
        StatusCode::FORBIDDEN => DiscordError::Forbidden(body),
        _ => DiscordError::Http { status, body },
    })
}

#[async_trait]
impl ChatService for DiscordApiClient {
    async fn connect(&mut self) -> Result<BotUser, DiscordError> {
        debug!(base_url = %self.base_url, "logging in");
        let resp = self.request(reqwest::Method::GET, "/users/@me")?.send().await?;
        let user: BotUser = check_status(resp).await?.json().await?;
        Ok(user)
    }

    async fn find_workspace(&self, id: u64) -> Result<Option<Guild>, DiscordError> {
        debug!(guild_id = id, "fetching guild");
        let resp = self
            .request(reqwest::Method::GET, &format!("/guilds/{id}"))?
            .send()
            .await?;
        match check_status(resp).await {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(DiscordError::Forbidden(_)) => Ok(None),
            Err(DiscordError::Http { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn text_channels(&self, guild: &Guild) -> Result<Vec<String>, DiscordError> {
        debug!(guild_id = %guild.id, "listing channels");
        let resp = self
            .request(reqwest::Method::GET, &format!("/guilds/{}/channels", guild.id))?
            .send()
            .await?;
        let channels: Vec<GuildChannel> = check_status(resp).await?.json().await?;
        Ok(channels
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT)
            .map(|c| c.name)
            .collect())
    }

    async fn create_text_channel(
        &self,
        guild: &Guild,
        name: &str,
    ) -> Result<GuildChannel, DiscordError> {
        let body = serde_json::json!({
            "name": name,
            "type": GUILD_TEXT,
        });
        debug!(guild_id = %guild.id, name = %name, "creating channel");
        let resp = self
            .request(reqwest::Method::POST, &format!("/guilds/{}/channels", guild.id))?
            .json(&body)
            .send()
            .await?;
        let channel: GuildChannel = check_status(resp).await?.json().await?;
        Ok(channel)
    }

    async fn close(&mut self) {
        debug!("closing Discord session");
        self.closed = true;
    }
}
