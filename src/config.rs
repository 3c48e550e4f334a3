use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::source::SourceKind;

// Include default configuration at compile time
const DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

pub const DEFAULT_CONFIG_FILE: &str = "inboxee.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub ews: EwsConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub mbox: MboxConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceKind>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            limit: default_limit(),
            sources: default_sources(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_folder() -> String {
    "inbox".to_string()
}

fn default_limit() -> usize {
    100
}

fn default_sources() -> Vec<SourceKind> {
    vec![SourceKind::Ews, SourceKind::Rest]
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct EwsConfig {
    #[serde(default = "default_ews_url")]
    pub url: String,
}

impl Default for EwsConfig {
    fn default() -> Self {
        Self {
            url: default_ews_url(),
        }
    }
}

fn default_ews_url() -> String {
    "https://outlook.office365.com/EWS/Exchange.asmx".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_rest_url")]
    pub url: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            url: default_rest_url(),
        }
    }
}

fn default_rest_url() -> String {
    "https://outlook.office.com/api".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MboxConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_senders")]
    pub top_senders: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_senders: default_top_senders(),
        }
    }
}

fn default_top_senders() -> usize {
    25
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fetch.limit == 0 {
            anyhow::bail!("fetch.limit must be greater than 0");
        }
        if self.report.top_senders == 0 {
            anyhow::bail!("report.top_senders must be greater than 0");
        }
        Ok(())
    }
}

/// Loads configuration from `config_path`, else `inboxee.toml` in the working
/// directory, else the embedded defaults.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    load_config_from(config_path, Path::new(DEFAULT_CONFIG_FILE))
}

fn load_config_from(config_path: Option<&Path>, default_file: &Path) -> Result<Config> {
    let start_time = Instant::now();
    info!(action = "start", component = "config_loading", "Starting configuration loading");

    let config = if let Some(path) = config_path {
        info!(action = "load", component = "config_file", file_path = ?path, "Loading configuration from specified file");
        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }

        let content = fs::read_to_string(path)?;
        Config::parse(&content).with_context(|| format!("Invalid config file {:?}", path))?
    } else if default_file.exists() {
        info!(action = "load", component = "default_config_file", file_path = ?default_file, "Loading configuration from default file");
        let content = fs::read_to_string(default_file)?;
        Config::parse(&content).with_context(|| format!("Invalid config file {:?}", default_file))?
    } else {
        info!(action = "load", component = "embedded_config", "Using embedded default configuration");
        Config::parse(DEFAULT_CONFIG).context("Failed to parse embedded default configuration")?
    };

    info!(
        action = "complete",
        component = "config_loading",
        source_count = config.fetch.sources.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Configuration loaded"
    );
    Ok(config)
}

pub fn init_default_config() -> Result<()> {
    init_default_config_at(Path::new(DEFAULT_CONFIG_FILE))?;
    println!("Created {} with default settings", DEFAULT_CONFIG_FILE);
    Ok(())
}

fn init_default_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first if you want to reinitialize.",
            path.display()
        );
    }

    fs::write(path, DEFAULT_CONFIG)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.fetch.folder, "inbox");
        assert_eq!(config.fetch.limit, 100);
        assert_eq!(config.fetch.sources, vec![SourceKind::Ews, SourceKind::Rest]);
        assert_eq!(config.report.top_senders, 25);
        assert!(config.mbox.path.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [fetch]
            sources = ["mbox", "sqlite"]

            [mbox]
            path = "/var/mail/me"
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.sources, vec![SourceKind::Mbox, SourceKind::Sqlite]);
        assert_eq!(config.fetch.limit, 100);
        assert_eq!(config.mbox.path, Some(PathBuf::from("/var/mail/me")));
        assert_eq!(config.rest.url, "https://outlook.office.com/api");
    }

    #[test]
    fn rejects_zero_limit_and_unknown_source() {
        assert!(Config::parse("[fetch]\nlimit = 0\n").is_err());
        assert!(Config::parse("[fetch]\nsources = [\"pop3\"]\n").is_err());
    }

    #[test]
    fn resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let default_file = dir.path().join(DEFAULT_CONFIG_FILE);

        let embedded = load_config_from(None, &default_file).unwrap();
        assert_eq!(embedded.fetch.limit, 100);

        fs::write(&default_file, "[fetch]\nlimit = 40\n").unwrap();
        let from_default = load_config_from(None, &default_file).unwrap();
        assert_eq!(from_default.fetch.limit, 40);

        let explicit = dir.path().join("other.toml");
        fs::write(&explicit, "[fetch]\nlimit = 7\n").unwrap();
        let from_explicit = load_config_from(Some(&explicit), &default_file).unwrap();
        assert_eq!(from_explicit.fetch.limit, 7);

        assert!(load_config_from(Some(&dir.path().join("missing.toml")), &default_file).is_err());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        init_default_config_at(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
        assert!(init_default_config_at(&path).is_err());
    }
}
