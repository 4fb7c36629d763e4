//! Headless Chrome session backend
//!
//! Each session launches its own browser process with a single tab. The
//! headless_chrome API is blocking, so every call runs on the blocking pool.
//! Dropping the browser kills the process, so a session that is never closed
//! explicitly still cleans up.
//!
//! A fetch timeout drops the future awaiting a navigation, not the blocking call
//! behind it. The next navigation notices the abandoned load and replaces the
//! tab before reusing the session.

use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, warn};
use tokio::task::{JoinError, JoinHandle};

use super::{Session, SessionFactory};
use crate::error::{Result, ScrapeError};

/// Launches one headless browser per worker.
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    headless: bool,
    sandbox: bool,
}

impl ChromeSessionFactory {
    pub fn new(headless: bool) -> Self {
        Self { headless, sandbox: true }
    }

    /// Disable the Chrome sandbox (needed when running as root in containers).
    pub fn without_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, worker: usize) -> Result<Box<dyn Session>> {
        let init_err = |message: String| ScrapeError::SessionInit { worker, message };

        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(self.sandbox)
            .build()
            .map_err(|e| init_err(format!("Invalid launch options: {}", e)))?;

        let (browser, tab) = tokio::task::spawn_blocking(move || {
            let browser = Browser::new(options).map_err(|e| e.to_string())?;
            let tab = browser.new_tab().map_err(|e| e.to_string())?;
            Ok::<_, String>((browser, tab))
        })
        .await
        .map_err(|e| init_err(format!("Launch task failed: {}", e)))?
        .map_err(init_err)?;

        debug!("worker {}: chrome session opened", worker);
        Ok(Box::new(ChromeSession {
            browser: Some(Arc::new(browser)),
            tab: Some(tab),
            pending: PendingNavigation::default(),
        }))
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

type NavResult = std::result::Result<(), String>;

/// The blocking navigation a session last started.
#[derive(Default)]
struct PendingNavigation {
    handle: Option<JoinHandle<NavResult>>,
}

impl PendingNavigation {
    /// Run `f` on the blocking pool. If the returned future is dropped early the
    /// handle stays behind and [`Self::abandoned`] reports it.
    async fn run<F>(&mut self, f: F) -> std::result::Result<NavResult, JoinError>
    where
        F: FnOnce() -> NavResult + Send + 'static,
    {
        let handle = self.handle.insert(tokio::task::spawn_blocking(f));
        let joined = handle.await;
        self.handle = None;
        joined
    }

    /// Whether the previous navigation was abandoned while still running.
    /// Clears the record either way.
    fn abandoned(&mut self) -> bool {
        self.handle.take().is_some_and(|h| !h.is_finished())
    }
}

/// One browser process and its tab.
pub struct ChromeSession {
    browser: Option<Arc<Browser>>,
    tab: Option<Arc<Tab>>,
    pending: PendingNavigation,
}

impl ChromeSession {
    fn closed(url: &str) -> ScrapeError {
        ScrapeError::Navigation {
            url: url.to_string(),
            message: "session already closed".to_string(),
        }
    }

    fn tab(&self, url: &str) -> Result<Arc<Tab>> {
        self.tab.clone().ok_or_else(|| Self::closed(url))
    }

    /// Close the current tab and open a fresh one in the same browser.
    async fn replace_tab(&mut self, url: &str) -> Result<()> {
        let browser = self.browser.clone().ok_or_else(|| Self::closed(url))?;
        let old = self.tab.take();
        let nav_err = |message: String| ScrapeError::Navigation {
            url: url.to_string(),
            message,
        };

        let tab = tokio::task::spawn_blocking(move || {
            if let Some(old) = old {
                let _ = old.close(true);
            }
            browser.new_tab().map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| nav_err(format!("Tab replacement task failed: {}", e)))?
        .map_err(|e| nav_err(format!("Could not open replacement tab: {}", e)))?;

        self.tab = Some(tab);
        Ok(())
    }
}

#[async_trait]
impl Session for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        if self.pending.abandoned() {
            warn!("previous navigation still loading, replacing tab before {}", url);
            self.replace_tab(url).await?;
        }

        let tab = self.tab(url)?;
        let target = url.to_string();
        self.pending
            .run(move || {
                tab.navigate_to(&target)
                    .and_then(|t| t.wait_until_navigated())
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                message: format!("Navigation task failed: {}", e),
            })?
            .map_err(|message| ScrapeError::Navigation {
                url: url.to_string(),
                message,
            })
    }

    async fn page_source(&mut self) -> Result<String> {
        let tab = self.tab("")?;
        tokio::task::spawn_blocking(move || tab.get_content().map_err(|e| e.to_string()))
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: String::new(),
                message: format!("Content task failed: {}", e),
            })?
            .map_err(|message| ScrapeError::Navigation {
                url: String::new(),
                message,
            })
    }

    async fn close(&mut self) -> Result<()> {
        self.pending.abandoned();
        if let Some(tab) = self.tab.take() {
            // Best effort; dropping the browser below terminates the process anyway.
            let _ = tokio::task::spawn_blocking(move || tab.close(true)).await;
        }
        if let Some(browser) = self.browser.take() {
            tokio::task::spawn_blocking(move || drop(browser))
                .await
                .map_err(|e| ScrapeError::Navigation {
                    url: String::new(),
                    message: format!("Browser shutdown failed: {}", e),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_timed_out_navigation_is_reported_as_abandoned() {
        let mut pending = PendingNavigation::default();
        let slow = tokio::time::timeout(
            Duration::from_millis(10),
            pending.run(|| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            }),
        )
        .await;
        assert!(slow.is_err());
        assert!(pending.abandoned());
        assert!(!pending.abandoned());
    }

    #[tokio::test]
    async fn test_completed_navigation_is_not_abandoned() {
        let mut pending = PendingNavigation::default();
        let done = pending.run(|| Err("net::ERR_NAME_NOT_RESOLVED".to_string())).await.unwrap();
        assert!(done.is_err());
        assert!(!pending.abandoned());
    }
}
