use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScrapeError;
use crate::session::Backend;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub source: SourceConfig,
    pub scrape: ScrapeConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
}

/// Where the class-schedule pages live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the schedule pages; `{base_url}/{term}/` is the term index and
    /// `{base_url}/{term}/{unit}` a unit page.
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.csus.edu/class-schedule".to_string(),
        }
    }
}

impl SourceConfig {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn index_url(&self, term: &str) -> String {
        format!("{}/{}/", self.base(), term)
    }

    pub fn unit_url(&self, term: &str, unit: &str) -> String {
        format!("{}/{}/{}", self.base(), term, unit)
    }

    /// Path prefix a link must contain to count as a unit page of `term`.
    pub fn path_prefix(&self, term: &str) -> std::result::Result<String, ScrapeError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ScrapeError::Config(format!("invalid base_url {}: {}", self.base_url, e)))?;
        Ok(format!("{}/{}/", url.path().trim_end_matches('/'), term))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Number of concurrent workers, one automation session each.
    pub concurrency: usize,
    pub backend: Backend,
    pub headless: bool,
    pub chrome_sandbox: bool,
    pub user_agent: Option<String>,
    pub fetch: FetchConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            backend: Backend::Http,
            headless: true,
            chrome_sandbox: true,
            user_agent: None,
            fetch: FetchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Budget for navigating to a unit page and seeing its content.
    pub page_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_timeout_ms: 10000,
            poll_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("slotscrape")
                .join("schedules"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub organization: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1024,
            timeout_ms: 60000,
            api_key_env: "OPENAI_API_KEY".to_string(),
            organization: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            source: SourceConfig::default(),
            scrape: ScrapeConfig::default(),
            storage: StorageConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scrape.concurrency == 0 {
            eyre::bail!("scrape.concurrency must be > 0");
        }
        if self.scrape.fetch.page_timeout_ms == 0 {
            eyre::bail!("scrape.fetch.page_timeout_ms must be > 0");
        }
        if self.scrape.fetch.poll_interval_ms == 0 {
            eyre::bail!("scrape.fetch.poll_interval_ms must be > 0");
        }
        reqwest::Url::parse(&self.source.base_url)
            .with_context(|| format!("source.base_url is not a URL: {}", self.source.base_url))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scrape.concurrency, 4);
        assert_eq!(config.scrape.backend, Backend::Http);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.scrape.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut config = Config::default();
        config.source.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_urls() {
        let source = SourceConfig {
            base_url: "https://www.csus.edu/class-schedule/".to_string(),
        };
        assert_eq!(source.index_url("fall-2024"), "https://www.csus.edu/class-schedule/fall-2024/");
        assert_eq!(source.unit_url("fall-2024", "ECON"), "https://www.csus.edu/class-schedule/fall-2024/ECON");
        assert_eq!(source.path_prefix("fall-2024").unwrap(), "/class-schedule/fall-2024/");
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("slotscrape.yml");
        fs::write(&path, "scrape:\n  concurrency: 8\n  backend: chrome\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.scrape.concurrency, 8);
        assert_eq!(config.scrape.backend, Backend::Chrome);
        assert_eq!(config.scrape.fetch.page_timeout_ms, 10000);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_explicit_missing_file_errors() {
        let path = PathBuf::from("/nonexistent/slotscrape.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
