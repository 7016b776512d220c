use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a config generator run.
///
/// Every variant is fatal: a partially rendered configuration would be
/// misleading, so the output file is never touched once one of these occurs.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Could not read CSV '{}': {source}", .path.display())]
    CsvRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV is empty")]
    CsvEmpty,

    #[error("No channel rows detected in CSV")]
    NoChannelRows,

    #[error("Invalid channel name '{raw}' on CSV line {line}: {source}")]
    InvalidChannelName {
        raw: String,
        line: u64,
        #[source]
        source: SlugError,
    },

    #[error("Placeholder {placeholder} not found in template {}", .path.display())]
    PlaceholderMissing { placeholder: String, path: PathBuf },

    #[error("Could not read template '{}': {source}", .path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not write output '{}': {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A raw channel name that cannot be turned into a slug.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SlugError {
    #[error("Channel name sanitised to empty string")]
    Empty,
}

/// Errors raised by the Discord REST client.
#[derive(Error, Debug)]
pub enum DiscordError {
    /// The API rejected the bot token (HTTP 401).
    #[error("invalid bot token")]
    InvalidToken,

    /// The bot lacks a permission for the request (HTTP 403).
    #[error("missing permissions: {0}")]
    Forbidden(String),

    /// Any other non-success response.
    #[error("Discord API returned {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("session is closed")]
    Closed,
}

/// Errors that stop the channel creator before it creates anything.
#[derive(Error, Debug)]
pub enum CreatorError {
    #[error("DISCORD_TOKEN and DISCORD_SERVER_ID must be set in the environment or in your .env file.")]
    MissingConfig,

    #[error("DISCORD_SERVER_ID '{0}' is not a valid server ID.")]
    InvalidServerId(String),

    #[error("Invalid DISCORD_TOKEN. Please check your credentials.")]
    InvalidToken,

    #[error(
        "Could not find a server with ID: {0}\n\
         Double-check the ID and ensure the bot is invited to that specific server."
    )]
    WorkspaceNotFound(u64),

    #[error("The file '{}' was not found.", .0.display())]
    CsvNotFound(PathBuf),

    #[error("Could not read '{}': {source}", .path.display())]
    CsvRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A remote call other than a channel creation failed.
    #[error(transparent)]
    Remote(DiscordError),
}
