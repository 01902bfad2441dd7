use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

const API_KEY_ENV: &str = "CMC_PRO_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CategoryConfig {
    /// Descriptions that count toward the wagering total.
    pub wagering: Vec<String>,
    /// Description of the separately reported win category.
    pub win: String,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        CategoryConfig {
            wagering: [
                "Original Bet",
                "Original War",
                "Third Party Bet",
                "Trade Bet-Contest",
                "Trade Bet-Contract",
                "Trade Bet-Order",
                "Sports Bet",
                "Horse Bet",
                "Lottery Lotter Purchase",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            win: "Third Party Win".to_string(),
        }
    }
}

/// Header names of the required columns in the transaction log.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ColumnConfig {
    pub create_date: String,
    pub description: String,
    pub uid: String,
    pub amount: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            create_date: "Create Date".to_string(),
            description: "Description".to_string(),
            uid: "UID".to_string(),
            amount: "real money change amount".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EcbProviderConfig {
    pub base_url: String,
}

impl Default for EcbProviderConfig {
    fn default() -> Self {
        EcbProviderConfig {
            base_url: "https://www.ecb.europa.eu".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinMarketCapProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for CoinMarketCapProviderConfig {
    fn default() -> Self {
        CoinMarketCapProviderConfig {
            base_url: "https://pro-api.coinmarketcap.com".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ecb: EcbProviderConfig,
    #[serde(default)]
    pub coinmarketcap: CoinMarketCapProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionCommand {
    Recalculate,
    Quit,
    Restart,
}

/// Maps typed answers to session commands.
///
/// Keys are stored trimmed and lowercased, the same way input is matched.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(
    from = "HashMap<String, SessionCommand>",
    into = "HashMap<String, SessionCommand>"
)]
pub struct CommandAliases(HashMap<String, SessionCommand>);

fn normalize_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}

impl CommandAliases {
    /// Looks up `input` ignoring surrounding whitespace and case.
    pub fn lookup(&self, input: &str) -> Option<SessionCommand> {
        self.0.get(&normalize_alias(input)).copied()
    }
}

impl From<HashMap<String, SessionCommand>> for CommandAliases {
    fn from(aliases: HashMap<String, SessionCommand>) -> Self {
        CommandAliases(
            aliases
                .into_iter()
                .map(|(alias, command)| (normalize_alias(&alias), command))
                .collect(),
        )
    }
}

impl From<CommandAliases> for HashMap<String, SessionCommand> {
    fn from(aliases: CommandAliases) -> Self {
        aliases.0
    }
}

impl Default for CommandAliases {
    fn default() -> Self {
        // Bopomofo keys share the y/n/r positions on Zhuyin keyboards
        CommandAliases(HashMap::from([
            ("y".to_string(), SessionCommand::Recalculate),
            ("ㄗ".to_string(), SessionCommand::Recalculate),
            ("n".to_string(), SessionCommand::Quit),
            ("ㄙ".to_string(), SessionCommand::Quit),
            ("r".to_string(), SessionCommand::Restart),
            ("ㄐ".to_string(), SessionCommand::Restart),
        ]))
    }
}

fn default_fixed_prices() -> HashMap<String, f64> {
    HashMap::from([
        ("BCD".to_string(), 1.0),
        ("JB".to_string(), 0.0),
        ("BCL".to_string(), 0.1),
    ])
}

fn default_refresh_after_hours() -> u64 {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub categories: CategoryConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub commands: CommandAliases,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// USD prices used for symbols no exchange or quote service lists.
    #[serde(default = "default_fixed_prices")]
    pub fixed_prices: HashMap<String, f64>,
    #[serde(default = "default_refresh_after_hours")]
    pub refresh_after_hours: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            categories: CategoryConfig::default(),
            columns: ColumnConfig::default(),
            commands: CommandAliases::default(),
            providers: ProvidersConfig::default(),
            fixed_prices: default_fixed_prices(),
            refresh_after_hours: default_refresh_after_hours(),
            request_timeout_secs: default_request_timeout_secs(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, or built-in defaults when there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "wager-tally", "wager-tally")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "wager-tally", "wager-tally")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// CoinMarketCap key from the config file, else from `CMC_PRO_API_KEY`.
    pub fn coinmarketcap_api_key(&self) -> Option<String> {
        self.providers
            .coinmarketcap
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn refresh_after(&self) -> Duration {
        Duration::from_secs(self.refresh_after_hours.saturating_mul(3600))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config.categories.wagering.len(), 9);
        assert!(
            config
                .categories
                .wagering
                .contains(&"Lottery Lotter Purchase".to_string())
        );
        assert_eq!(config.categories.win, "Third Party Win");
        assert_eq!(config.columns.amount, "real money change amount");
        assert_eq!(config.fixed_prices.get("BCL"), Some(&0.1));
        assert_eq!(config.refresh_after(), Duration::from_secs(8 * 3600));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.providers.ecb.base_url,
            "https://www.ecb.europa.eu".to_string()
        );
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
categories:
  wagering:
    - "Casino Bet"
columns:
  uid: "Account"
commands:
  again: recalculate
  quit: quit
providers:
  ecb:
    base_url: "http://example.com/ecb"
  coinmarketcap:
    base_url: "http://example.com/cmc"
    api_key: "secret"
fixed_prices:
  FOO: 2.5
refresh_after_hours: 1
data_path: "/tmp/wager-tally"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.categories.wagering, vec!["Casino Bet".to_string()]);
        assert_eq!(config.categories.win, "Third Party Win");
        assert_eq!(config.columns.uid, "Account");
        assert_eq!(config.columns.create_date, "Create Date");
        assert_eq!(config.commands.lookup(" AGAIN "), Some(SessionCommand::Recalculate));
        assert_eq!(config.commands.lookup("y"), None);
        assert_eq!(config.providers.ecb.base_url, "http://example.com/ecb");
        assert_eq!(
            config.coinmarketcap_api_key(),
            Some("secret".to_string())
        );
        assert_eq!(config.fixed_prices.len(), 1);
        assert_eq!(config.refresh_after(), Duration::from_secs(3600));
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/wager-tally")
        );
    }

    #[test]
    fn test_default_command_aliases() {
        let commands = CommandAliases::default();
        assert_eq!(commands.lookup("Y"), Some(SessionCommand::Recalculate));
        assert_eq!(commands.lookup("ㄗ"), Some(SessionCommand::Recalculate));
        assert_eq!(commands.lookup("n\n"), Some(SessionCommand::Quit));
        assert_eq!(commands.lookup("ㄐ"), Some(SessionCommand::Restart));
        assert_eq!(commands.lookup("maybe"), None);
    }

    #[test]
    fn test_configured_aliases_match_any_case() {
        let config: AppConfig =
            serde_yaml::from_str("commands:\n  \" Again \": recalculate\n  BYE: quit\n")
                .expect("Failed to deserialize");
        assert_eq!(config.commands.lookup("again"), Some(SessionCommand::Recalculate));
        assert_eq!(config.commands.lookup("AGAIN"), Some(SessionCommand::Recalculate));
        assert_eq!(config.commands.lookup("bye"), Some(SessionCommand::Quit));
    }

    #[test]
    fn test_huge_refresh_interval_saturates() {
        let config: AppConfig =
            serde_yaml::from_str(&format!("refresh_after_hours: {}", u64::MAX))
                .expect("Failed to deserialize");
        assert_eq!(config.refresh_after(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_load_from_path_reports_bad_yaml() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "refresh_after_hours: [").unwrap();
        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
