//! Automation sessions
//!
//! A session is one heavyweight page-driving resource (a browser tab, an HTTP
//! client with its own cookie jar). Workers own exactly one each and never share
//! it. Sessions are opened through a [`SessionFactory`] so the pool can be run
//! against a real browser, plain HTTP, or an in-memory page set.

pub mod http;
pub mod memory;

#[cfg(feature = "chrome")]
pub mod chrome;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};

pub use http::HttpSessionFactory;
pub use memory::MemorySessionFactory;

#[cfg(feature = "chrome")]
pub use chrome::ChromeSessionFactory;

/// One exclusively-owned page-driving session.
#[async_trait]
pub trait Session: Send {
    /// Load `url`. Returns once the navigation itself has completed; content
    /// produced later by scripts may still be missing.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Current markup of the loaded page.
    async fn page_source(&mut self) -> Result<String>;

    /// Release the underlying resource. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions for workers.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a fresh session for `worker`.
    async fn open(&self, worker: usize) -> Result<Box<dyn Session>>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Which session backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Plain HTTP fetch, no script execution
    #[default]
    Http,
    /// Headless Chrome (requires the `chrome` feature)
    Chrome,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Http => write!(f, "http"),
            Backend::Chrome => write!(f, "chrome"),
        }
    }
}

/// Build the session factory selected in `config`.
pub fn factory_from_config(config: &ScrapeConfig) -> Result<Arc<dyn SessionFactory>> {
    match config.backend {
        Backend::Http => {
            let mut factory = HttpSessionFactory::new(Duration::from_millis(config.fetch.page_timeout_ms));
            if let Some(agent) = &config.user_agent {
                factory = factory.with_user_agent(agent.clone());
            }
            Ok(Arc::new(factory))
        }
        #[cfg(feature = "chrome")]
        Backend::Chrome => {
            let mut factory = ChromeSessionFactory::new(config.headless);
            if !config.chrome_sandbox {
                factory = factory.without_sandbox();
            }
            Ok(Arc::new(factory))
        }
        #[cfg(not(feature = "chrome"))]
        Backend::Chrome => Err(ScrapeError::Config(
            "chrome backend requires building with --features chrome".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_factory_from_config() {
        let config = ScrapeConfig::default();
        let factory = factory_from_config(&config).unwrap();
        assert_eq!(factory.name(), "http");
    }

    #[cfg(not(feature = "chrome"))]
    #[test]
    fn test_chrome_without_feature_is_config_error() {
        let config = ScrapeConfig {
            backend: Backend::Chrome,
            ..Default::default()
        };
        assert!(matches!(factory_from_config(&config), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::Http.to_string(), "http");
        assert_eq!(Backend::Chrome.to_string(), "chrome");
    }
}
