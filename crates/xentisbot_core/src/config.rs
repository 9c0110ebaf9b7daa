use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{GlossaryPaths, SourcePaths};

pub const DEFAULT_BOT_NAME: &str = "xentisbot";
pub const DEFAULT_USER_AGENT: &str = "xentisbot/0.2";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SEARCH_COMMAND: &str = "xentis stat";
pub const DEFAULT_PREFIX_HOST: &str = "pdvmapp";
pub const DEFAULT_PREFIX_COMMAND: &str = "xentis stat";
pub const DEFAULT_PREFIX_USER: &str = "xen";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BotConfig {
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub servers: ServersSection,
    #[serde(default)]
    pub db_status: DbStatusSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BotSection {
    pub name: Option<String>,
    /// Chat user id of the bot; messages starting with `<@ID>` address it.
    pub user_id: Option<String>,
    pub admin_user: Option<String>,
    #[serde(default)]
    pub observed_channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SourcesSection {
    pub schema: Option<PathBuf>,
    pub key_migration: Option<PathBuf>,
    pub syscodes: Option<PathBuf>,
    pub syssubsets: Option<PathBuf>,
    #[serde(default)]
    pub glossary: Vec<GlossaryEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub source: PathBuf,
    pub target: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ServersSection {
    #[serde(default)]
    pub search_hosts: Vec<String>,
    pub search_command: Option<String>,
    pub prefix_host: Option<String>,
    pub prefix_command: Option<String>,
    pub prefix_user: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct DbStatusSection {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

/// Effective server settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub search_hosts: Vec<String>,
    pub search_command: String,
    pub prefix_host: String,
    pub prefix_command: String,
    pub prefix_user: String,
    pub connect_timeout: Duration,
}

impl BotConfig {
    pub fn bot_name(&self) -> &str {
        self.bot.name.as_deref().unwrap_or(DEFAULT_BOT_NAME)
    }

    /// Mention tag that addresses the bot in a channel, if a user id is configured.
    pub fn mention_tag(&self) -> Option<String> {
        self.bot
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| format!("<@{id}>"))
    }

    /// Resolve the status page URL: env XENTISBOT_DB_STATUS_URL > config > None.
    pub fn db_status_url(&self) -> Option<String> {
        self.db_status_url_with_lookup(env_lookup)
    }

    pub fn db_status_url_with_lookup<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        env_override(&lookup, "XENTISBOT_DB_STATUS_URL").or_else(|| self.db_status.url.clone())
    }

    /// Resolve user agent: env XENTISBOT_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        self.user_agent_with_lookup(env_lookup)
    }

    pub fn user_agent_with_lookup<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        env_override(&lookup, "XENTISBOT_USER_AGENT")
            .or_else(|| self.db_status.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve the HTTP timeout: env XENTISBOT_HTTP_TIMEOUT_MS > config > default.
    /// Unparseable env values fall through to the config.
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout_with_lookup(env_lookup)
    }

    pub fn http_timeout_with_lookup<F>(&self, lookup: F) -> Duration
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = env_override(&lookup, "XENTISBOT_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.db_status.timeout_ms)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
        Duration::from_millis(millis)
    }

    pub fn server_settings(&self) -> ServerSettings {
        let servers = &self.servers;
        ServerSettings {
            search_hosts: servers
                .search_hosts
                .iter()
                .map(|host| host.trim().to_string())
                .filter(|host| !host.is_empty())
                .collect(),
            search_command: servers
                .search_command
                .clone()
                .unwrap_or_else(|| DEFAULT_SEARCH_COMMAND.to_string()),
            prefix_host: servers
                .prefix_host
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX_HOST.to_string()),
            prefix_command: servers
                .prefix_command
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX_COMMAND.to_string()),
            prefix_user: servers
                .prefix_user
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX_USER.to_string()),
            connect_timeout: Duration::from_secs(
                servers
                    .connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        }
    }

    /// Source file locations with relative paths anchored at `data_dir`.
    pub fn source_paths(&self, data_dir: &Path) -> SourcePaths {
        let anchor = |path: &PathBuf| {
            if path.is_absolute() {
                path.clone()
            } else {
                data_dir.join(path)
            }
        };
        let sources = &self.sources;
        SourcePaths {
            schema: sources.schema.as_ref().map(anchor),
            key_migration: sources.key_migration.as_ref().map(anchor),
            syscodes: sources.syscodes.as_ref().map(anchor),
            syssubsets: sources.syssubsets.as_ref().map(anchor),
            glossaries: sources
                .glossary
                .iter()
                .map(|entry| GlossaryPaths {
                    source: anchor(&entry.source),
                    target: anchor(&entry.target),
                })
                .collect(),
        }
    }
}

fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn env_override<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Load and parse a BotConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<BotConfig> {
    if !config_path.exists() {
        return Ok(BotConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: BotConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
