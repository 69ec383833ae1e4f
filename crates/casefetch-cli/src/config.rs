use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use casefetch_core::PortalConfig;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Login helper used when neither the flag nor the profile names one.
pub const DEFAULT_LOGIN_COMMAND: &str = "casefetch-login";

pub const CONFIG_KEYS: &[&str] = &[
    "search_url",
    "login_command",
    "request_timeout_secs",
    "login_timeout_secs",
    "fan_out_limit",
    "max_pages",
    "format",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileConfig {
    pub search_url: Option<String>,
    pub login_command: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub login_timeout_secs: Option<u64>,
    pub fan_out_limit: Option<usize>,
    pub max_pages: Option<u32>,
    pub format: Option<String>,
}

impl ProfileConfig {
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "search_url" => self.search_url = Some(value.to_string()),
            "login_command" => self.login_command = Some(value.to_string()),
            "request_timeout_secs" => {
                self.request_timeout_secs = Some(value.parse().context("expected seconds")?)
            }
            "login_timeout_secs" => {
                self.login_timeout_secs = Some(value.parse().context("expected seconds")?)
            }
            "fan_out_limit" => {
                self.fan_out_limit = Some(value.parse().context("expected a positive number")?)
            }
            "max_pages" => self.max_pages = Some(value.parse().context("expected a positive number")?),
            "format" => self.format = Some(value.to_string()),
            other => anyhow::bail!(
                "Unknown config key: {other}. Valid keys: {}",
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Library configuration with this profile applied over the defaults.
    pub fn portal_config(&self) -> PortalConfig {
        let mut config = PortalConfig::default();
        if let Some(url) = &self.search_url {
            config = config.with_search_url(url.clone());
        }
        if let Some(secs) = self.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = self.fan_out_limit {
            config = config.with_fan_out_limit(limit);
        }
        if let Some(pages) = self.max_pages {
            config = config.with_max_pages(pages);
        }
        config
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs.unwrap_or(60))
    }
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

/// Effective settings for one invocation: flags and env over profile over defaults.
pub struct Settings {
    pub portal: PortalConfig,
    pub login_command: String,
    pub login_timeout: Duration,
    pub credentials_path: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".casefetch");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn credentials_path(profile: &str) -> Result<PathBuf> {
    Ok(config_dir()?.join(format!("credentials.{profile}.json")))
}

fn load_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(path)?;
    let cfg: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(cfg)
}

fn save_to(path: &Path, profile: &str, config: &ProfileConfig) -> Result<()> {
    let mut all = load_from(path)?;
    all.insert(profile.to_string(), config.clone());
    let content = toml::to_string_pretty(&all)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_profile(profile: &str) -> Result<ProfileConfig> {
    let mut all = load_from(&config_path()?)?;
    Ok(all.remove(profile).unwrap_or_default())
}

pub fn save_profile(profile: &str, config: &ProfileConfig) -> Result<()> {
    save_to(&config_path()?, profile, config)
}

pub fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let profile = load_profile(&cli.profile)?;
    let mut portal = profile.portal_config();
    // --search-url flag / CASEFETCH_SEARCH_URL env
    if let Some(url) = &cli.search_url {
        portal = portal.with_search_url(url.clone());
    }
    let login_command = cli
        .login_command
        .clone()
        .or_else(|| profile.login_command.clone())
        .unwrap_or_else(|| DEFAULT_LOGIN_COMMAND.to_string());

    Ok(Settings {
        portal,
        login_command,
        login_timeout: profile.login_timeout(),
        credentials_path: credentials_path(&cli.profile)?,
    })
}
