use std::collections::HashMap;

use crate::error::GeneratorError;
use crate::records::ChannelRow;
use crate::slug::slugify;

/// Prefix of every generated gateway name.
pub const GATEWAY_PREFIX: &str = "bridge-";
/// Matterbridge account of the Slack side.
pub const SLACK_ACCOUNT: &str = "slack.my-slack";
/// Matterbridge account of the Discord side.
pub const DISCORD_ACCOUNT: &str = "discord.my-discord";

/// Names handed out during one run, with the CSV line that first claimed them.
#[derive(Debug, Default)]
pub struct NameRegistry {
    seen: HashMap<String, u64>,
}
impl NameRegistry {
    pub fn new() -> NameRegistry {
        NameRegistry::default()
    }

    /// Claim `base` for `line`, or the first free `base-2`, `base-3`, ...
    pub fn claim(&mut self, base: &str, line: u64) -> String {
        let mut suffix: u32 = 1;
        let mut candidate = base.to_string();
        while self.seen.contains_key(&candidate) {
            suffix += 1;
            candidate = format!("{}-{}", base, suffix);
        }
        self.seen.insert(candidate.clone(), line);
        candidate
    }

    /// The line that first claimed `name`.
    pub fn first_seen(&self, name: &str) -> Option<u64> {
        self.seen.get(name).copied()
    }
}

/// A gateway whose names have been made unique for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub name: String,
    pub slack_channel: String,
    pub discord_channel: String,
}
impl Gateway {
    /// Render the gateway as a Matterbridge TOML block.
    pub fn render(&self) -> String {
        format!(
            "[[gateway]]\n\
             name=\"{}\"\n\
             enable=true\n\
             PreserveThreading=true\n\
             \n  [[gateway.inout]]\n  \
             account=\"{}\"\n  \
             channel=\"{}\"\n\
             \n  [[gateway.inout]]\n  \
             account=\"{}\"\n  \
             channel=\"{}\"",
            self.name,
            SLACK_ACCOUNT,
            escape_toml(&self.slack_channel),
            DISCORD_ACCOUNT,
            self.discord_channel,
        )
    }
}

/// Escape a value for a basic TOML string.
fn escape_toml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04X}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Resolve slugs and gateway names for all rows, in row order.
pub fn build_gateways(channels: &[ChannelRow]) -> Result<Vec<Gateway>, GeneratorError> {
    let mut seen_discord = NameRegistry::new();
    let mut seen_gateway = NameRegistry::new();
    let mut gateways: Vec<Gateway> = Vec::with_capacity(channels.len());
    for row in channels {
        let base = slugify(&row.raw_name).map_err(|source| GeneratorError::InvalidChannelName {
            raw: row.raw_name.clone(),
            line: row.line,
            source,
        })?;
        let discord_name = seen_discord.claim(&base, row.line);
        if discord_name != base {
            tracing::debug!(
                slug = %base,
                resolved = %discord_name,
                first_line = seen_discord.first_seen(&base),
                line = row.line,
                "channel slug already taken"
            );
        }
        let gateway_name = seen_gateway.claim(&format!("{}{}", GATEWAY_PREFIX, discord_name), row.line);
        gateways.push(Gateway {
            name: gateway_name,
            slack_channel: row.external_id.clone(),
            discord_channel: discord_name,
        });
    }
    Ok(gateways)
}

/// Render all gateway blocks, separated by a blank line.
pub fn build_gateway_blocks(channels: &[ChannelRow]) -> Result<String, GeneratorError> {
    let blocks: Vec<String> = build_gateways(channels)?
        .iter()
        .map(Gateway::render)
        .collect();
    Ok(blocks.join("\n\n"))
}
