//! HTTP session backend
//!
//! Fetches pages with reqwest. There is no script execution, so the page source
//! is exactly what the server sent; polling it for late content only succeeds if
//! the content was there from the start.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Session, SessionFactory};
use crate::error::{Result, ScrapeError};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Opens one reqwest client (and cookie jar) per worker.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    timeout: Duration,
    user_agent: String,
}

impl HttpSessionFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, worker: usize) -> Result<Box<dyn Session>> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .cookie_store(true)
            .build()
            .map_err(|e| ScrapeError::SessionInit {
                worker,
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Box::new(HttpSession {
            client: Some(client),
            body: String::new(),
        }))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Session backed by a reqwest client.
pub struct HttpSession {
    client: Option<Client>,
    body: String,
}

impl HttpSession {
    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ScrapeError::Navigation {
                url: String::new(),
                message: "session already closed".to_string(),
            })
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let nav_err = |message: String| ScrapeError::Navigation {
            url: url.to_string(),
            message,
        };

        let response = self
            .client()?
            .get(url)
            .send()
            .await
            .map_err(|e| nav_err(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(nav_err(format!("HTTP {}", status)));
        }

        self.body = response
            .text()
            .await
            .map_err(|e| nav_err(format!("Failed to read body: {}", e)))?;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.body.clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        self.body.clear();
        Ok(())
    }
}
