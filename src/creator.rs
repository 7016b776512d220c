use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::discord::{ChatService, Guild};
use crate::error::{CreatorError, DiscordError};
use crate::records::{channel_name, read_records};
use crate::slug::normalize_channel_name;

/// CSV the creator reads, relative to the working directory.
pub const CSV_FILE: &str = "channels.csv";

/// Optional file with `KEY=value` lines, relative to the working directory.
pub const DOTENV_FILE: &str = ".env";

const TOKEN_VAR: &str = "DISCORD_TOKEN";
const SERVER_ID_VAR: &str = "DISCORD_SERVER_ID";

/// Everything a creator run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorConfig {
    pub token: String,
    pub server_id: u64,
    pub csv_path: PathBuf,
}

impl CreatorConfig {
    /// Read the configuration from `DISCORD_TOKEN` and `DISCORD_SERVER_ID`,
    /// falling back to a `.env` file in the working directory.
    pub fn from_env() -> Result<CreatorConfig, CreatorError> {
        CreatorConfig::from_env_and_dotenv(|key| std::env::var(key).ok(), Path::new(DOTENV_FILE))
    }

    /// Layer `env` over the variables of a dotenv file.
    ///
    /// A value present in `env` always wins. A missing dotenv file is fine.
    pub fn from_env_and_dotenv<F>(env: F, dotenv_path: &Path) -> Result<CreatorConfig, CreatorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_vars = read_dotenv(dotenv_path);
        CreatorConfig::from_lookup(|key| env(key).or_else(|| file_vars.get(key).cloned()))
    }

    /// Build the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<CreatorConfig, CreatorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let (Some(token), Some(server_id)) = (non_blank(TOKEN_VAR), non_blank(SERVER_ID_VAR))
        else {
            return Err(CreatorError::MissingConfig);
        };
        let server_id = server_id
            .trim()
            .parse::<u64>()
            .map_err(|_| CreatorError::InvalidServerId(server_id.clone()))?;
        Ok(CreatorConfig {
            token: token.trim().to_string(),
            server_id,
            csv_path: PathBuf::from(CSV_FILE),
        })
    }
}

/// Variables defined in a dotenv file, without touching the process environment.
fn read_dotenv(path: &Path) -> HashMap<String, String> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) => {
            if !err.not_found() {
                tracing::warn!(path = %path.display(), error = %err, "could not open dotenv file");
            }
            return HashMap::new();
        }
    };
    let mut vars: HashMap<String, String> = HashMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping dotenv line");
            }
        }
    }
    vars
}

/// What a finished run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Names of the channels Discord created.
    pub created: Vec<String>,
    /// Desired names whose creation failed.
    pub failed: Vec<String>,
}

/// Read the desired channel names from the second column of the CSV.
pub fn read_desired_channels(csv_path: &Path) -> Result<Vec<String>, CreatorError> {
    let records = read_records(csv_path).map_err(|source| {
        let not_found = matches!(source.kind(), csv::ErrorKind::Io(e) if e.kind() == ErrorKind::NotFound);
        if not_found {
            CreatorError::CsvNotFound(csv_path.to_path_buf())
        } else {
            CreatorError::CsvRead {
                path: csv_path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok(records
        .iter()
        .filter_map(|row| channel_name(&row.record))
        .map(str::to_string)
        .collect())
}

/// Pick the desired channels that do not exist yet.
///
/// A name exists if its normalised form equals an existing channel name. Only
/// the snapshot taken at startup is consulted, so repeated CSV names are all
/// kept, in CSV order.
pub fn plan_channels(existing: &[String], desired: &[String]) -> Vec<String> {
    let existing: HashSet<&str> = existing.iter().map(String::as_str).collect();
    desired
        .iter()
        .map(|name| name.trim())
        .filter(|name| !existing.contains(normalize_channel_name(name).as_str()))
        .map(str::to_string)
        .collect()
}

/// Log in, create the missing channels, and close the session.
///
/// Fatal problems are printed and returned; the session is closed either way.
pub async fn run<S>(service: &mut S, config: &CreatorConfig) -> Result<RunReport, CreatorError>
where
    S: ChatService + ?Sized,
{
    let result = match service.connect().await {
        Ok(user) => {
            println!("Logged in as {} (ID: {})", user.username, user.id);
            println!("------");
            sync_channels(&*service, config).await
        }
        Err(DiscordError::InvalidToken) => Err(CreatorError::InvalidToken),
        Err(e) => Err(CreatorError::Remote(e)),
    };
    match &result {
        Ok(report) => {
            tracing::info!(
                created = report.created.len(),
                failed = report.failed.len(),
                "channel sync finished"
            );
            println!("------");
            println!("Task finished. Shutting down bot.");
        }
        Err(e) => println!("Error: {}", e),
    }
    service.close().await;
    result
}

async fn sync_channels<S>(service: &S, config: &CreatorConfig) -> Result<RunReport, CreatorError>
where
    S: ChatService + ?Sized,
{
    let guild: Guild = service
        .find_workspace(config.server_id)
        .await
        .map_err(CreatorError::Remote)?
        .ok_or(CreatorError::WorkspaceNotFound(config.server_id))?;
    println!("Connected to server: {}", guild.name);

    let existing = service
        .text_channels(&guild)
        .await
        .map_err(CreatorError::Remote)?;
    println!("Found {} existing text channels.", existing.len());

    let desired = read_desired_channels(&config.csv_path)?;
    println!(
        "Reading {} channel names from {}.",
        desired.len(),
        config.csv_path.display()
    );

    let mut report = RunReport::default();
    let to_create = plan_channels(&existing, &desired);
    if to_create.is_empty() {
        println!("All channels from the CSV already exist. Nothing to do.");
        return Ok(report);
    }

    println!("Attempting to create {} new channels...", to_create.len());
    for name in to_create {
        match service.create_text_channel(&guild, &name).await {
            Ok(channel) => {
                println!("Successfully created: '{}'", channel.name);
                report.created.push(channel.name);
            }
            Err(DiscordError::Forbidden(body)) => {
                tracing::debug!(name = %name, body = %body, "channel creation forbidden");
                println!("Error: Missing 'Manage Channels' permission for '{}'.", name);
                report.failed.push(name);
            }
            Err(e) => {
                println!("HTTP Error on '{}': {}", name, e);
                report.failed.push(name);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_plan_channels_skips_existing() {
        let plan = plan_channels(
            &strings(&["general", "random"]),
            &strings(&["General", "New Topic"]),
        );
        assert_eq!(plan, strings(&["New Topic"]));
    }

    #[test]
    fn test_plan_channels_keeps_repeated_desired() {
        let plan = plan_channels(
            &strings(&["ops"]),
            &strings(&[" Team A ", "team a", "Team-A", "ops", "OPS"]),
        );
        assert_eq!(plan, strings(&["Team A", "team a", "Team-A"]));
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("DISCORD_TOKEN", "abc"), ("DISCORD_SERVER_ID", " 1234 ")]);
        let config = CreatorConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.server_id, 1234);
        assert_eq!(config.csv_path, PathBuf::from("channels.csv"));
    }

    #[test]
    fn test_config_missing_values() {
        let only_token: HashMap<&str, &str> = HashMap::from([("DISCORD_TOKEN", "abc")]);
        assert!(matches!(
            CreatorConfig::from_lookup(|k| only_token.get(k).map(|v| v.to_string())),
            Err(CreatorError::MissingConfig)
        ));
        let blank_token: HashMap<&str, &str> =
            HashMap::from([("DISCORD_TOKEN", "  "), ("DISCORD_SERVER_ID", "1")]);
        assert!(matches!(
            CreatorConfig::from_lookup(|k| blank_token.get(k).map(|v| v.to_string())),
            Err(CreatorError::MissingConfig)
        ));
    }

    #[test]
    fn test_config_invalid_server_id() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("DISCORD_TOKEN", "abc"), ("DISCORD_SERVER_ID", "my-server")]);
        let err = CreatorConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "DISCORD_SERVER_ID 'my-server' is not a valid server ID."
        );
    }

    #[test]
    fn test_config_from_dotenv_file() {
        let dir = TempDir::new().unwrap();
        let dotenv = dir.path().join(".env");
        fs::write(&dotenv, "# bot settings\nDISCORD_TOKEN=file-token\nDISCORD_SERVER_ID=\"777\"\n").unwrap();

        let config = CreatorConfig::from_env_and_dotenv(|_| None, &dotenv).unwrap();
        assert_eq!(config.token, "file-token");
        assert_eq!(config.server_id, 777);
    }

    #[test]
    fn test_config_environment_wins_over_dotenv() {
        let dir = TempDir::new().unwrap();
        let dotenv = dir.path().join(".env");
        fs::write(&dotenv, "DISCORD_TOKEN=file-token\nDISCORD_SERVER_ID=777\n").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([("DISCORD_TOKEN", "env-token")]);

        let config =
            CreatorConfig::from_env_and_dotenv(|k| env.get(k).map(|v| v.to_string()), &dotenv)
                .unwrap();
        assert_eq!(config.token, "env-token");
        assert_eq!(config.server_id, 777);
    }

    #[test]
    fn test_config_without_dotenv_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            CreatorConfig::from_env_and_dotenv(|_| None, &dir.path().join(".env")),
            Err(CreatorError::MissingConfig)
        ));
    }
}
