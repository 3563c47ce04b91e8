use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::state::StoreOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub solana: SolanaConfig,
    #[serde(default = "default_programs")]
    pub programs: BTreeMap<String, ProgramAddress>,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    /// Cluster name to JSON-RPC endpoint.
    #[serde(default = "default_clusters")]
    pub clusters: BTreeMap<String, String>,
}

/// A program is either deployed at the same address everywhere or at a
/// different address per cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProgramAddress {
    Everywhere(String),
    PerCluster(BTreeMap<String, String>),
}

impl ProgramAddress {
    pub fn for_cluster(&self, cluster: &str) -> Option<&str> {
        match self {
            Self::Everywhere(address) => Some(address.as_str()),
            Self::PerCluster(by_cluster) => by_cluster.get(cluster).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Short name to `owner/repo`.
    #[serde(default = "default_repos")]
    pub repos: BTreeMap<String, String>,
    #[serde(default = "default_tags_limit")]
    pub tags_limit: usize,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub slack_webhook: String,
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rules: AlertRulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRulesConfig {
    #[serde(default = "default_true")]
    pub cluster_version: bool,
    #[serde(default = "default_true")]
    pub github_tag: bool,
    #[serde(default = "default_true")]
    pub program_deploy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub slack_webhook: Option<String>,
    pub github_token: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/solana-version-notifier/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::parse(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(webhook) = overrides.slack_webhook {
            self.alerts.slack_webhook = webhook;
        }
        if let Some(token) = overrides.github_token {
            self.github.token = token;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.storage.busy_timeout_ms),
        }
    }

    pub fn github_token(&self) -> Option<&str> {
        let token = self.github.token.trim();
        (!token.is_empty()).then_some(token)
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
db_path = "~/.local/share/solana-version-notifier/versions.db"
busy_timeout_ms = 5000

[solana.clusters]
devnet = "https://api.devnet.solana.com"
testnet = "https://api.testnet.solana.com"
mainnet-beta = "https://api.mainnet-beta.solana.com"

[programs]
metaplex = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s"
# per-cluster addresses:
# my-program = { devnet = "...", mainnet-beta = "..." }

[github]
tags_limit = 10
token = ""

[github.repos]
solana = "solana-labs/solana"
spl = "solana-labs/solana-program-library"
metaplex = "metaplex-foundation/metaplex-program-library"

[alerts]
slack_webhook = ""
enable_stdout = true

[alerts.rules]
cluster_version = true
github_tag = true
program_deploy = true

[watch]
interval_secs = 600
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            solana: SolanaConfig::default(),
            programs: default_programs(),
            github: GithubConfig::default(),
            alerts: AlertsConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repos: default_repos(),
            tags_limit: default_tags_limit(),
            token: String::new(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            slack_webhook: String::new(),
            enable_stdout: default_enable_stdout(),
            rules: AlertRulesConfig::default(),
        }
    }
}

impl Default for AlertRulesConfig {
    fn default() -> Self {
        Self {
            cluster_version: true,
            github_tag: true,
            program_deploy: true,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/solana-version-notifier/versions.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_clusters() -> BTreeMap<String, String> {
    [
        ("devnet", "https://api.devnet.solana.com"),
        ("testnet", "https://api.testnet.solana.com"),
        ("mainnet-beta", "https://api.mainnet-beta.solana.com"),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_string(), url.to_string()))
    .collect()
}

fn default_programs() -> BTreeMap<String, ProgramAddress> {
    BTreeMap::from([(
        "metaplex".to_string(),
        ProgramAddress::Everywhere("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s".to_string()),
    )])
}

fn default_repos() -> BTreeMap<String, String> {
    [
        ("solana", "solana-labs/solana"),
        ("spl", "solana-labs/solana-program-library"),
        ("metaplex", "metaplex-foundation/metaplex-program-library"),
    ]
    .into_iter()
    .map(|(name, repo)| (name.to_string(), repo.to_string()))
    .collect()
}

fn default_tags_limit() -> usize {
    10
}

fn default_enable_stdout() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigOverrides, ProgramAddress};

    #[test]
    fn template_parses_to_defaults() {
        let parsed = Config::parse(&Config::default_template()).expect("template parses");
        let defaults = Config::default();
        assert_eq!(parsed.solana.clusters, defaults.solana.clusters);
        assert_eq!(parsed.github.repos, defaults.github.repos);
        assert_eq!(parsed.programs, defaults.programs);
        assert_eq!(parsed.github.tags_limit, 10);
        assert_eq!(parsed.watch.interval_secs, 600);
    }

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let parsed = Config::parse("").unwrap();
        assert_eq!(parsed.solana.clusters.len(), 3);
        assert!(parsed.programs.contains_key("metaplex"));
        assert!(parsed.alerts.enable_stdout);
        assert!(parsed.github_token().is_none());
    }

    #[test]
    fn per_cluster_program_addresses() {
        let parsed = Config::parse(
            r#"
[programs]
global = "Addr111"
split = { devnet = "DevAddr", mainnet-beta = "MainAddr" }
"#,
        )
        .unwrap();
        let global = &parsed.programs["global"];
        assert_eq!(global.for_cluster("testnet"), Some("Addr111"));
        let split = &parsed.programs["split"];
        assert!(matches!(split, ProgramAddress::PerCluster(_)));
        assert_eq!(split.for_cluster("devnet"), Some("DevAddr"));
        assert_eq!(split.for_cluster("testnet"), None);
    }

    #[test]
    fn overrides_replace_values() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            db_path: Some("/tmp/v.db".to_string()),
            slack_webhook: Some("https://hooks.slack.com/services/x".to_string()),
            github_token: Some("  ".to_string()),
        });
        assert_eq!(config.resolved_db_path().to_str(), Some("/tmp/v.db"));
        assert_eq!(
            config.alerts.slack_webhook,
            "https://hooks.slack.com/services/x"
        );
        assert!(config.github_token().is_none());
        assert_eq!(config.store_options().busy_timeout.as_millis(), 5_000);
    }
}
