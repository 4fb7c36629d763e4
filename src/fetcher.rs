//! Page fetcher: navigate, then wait for the content container
//!
//! Readiness is an explicit condition (the content selector matches) polled until
//! a per-unit deadline, never a fixed sleep. When the deadline passes the caller
//! gets `NavigationTimeout` instead of a page missing its content.

use std::time::{Duration, Instant};

use log::debug;
use scraper::Selector;

use crate::config::FetchConfig;
use crate::error::{Result, ScrapeError};
use crate::parser::TableParser;
use crate::session::Session;

/// Navigates a session and waits for content.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    timeout: Duration,
    poll_interval: Duration,
}

impl PageFetcher {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self { timeout, poll_interval }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.page_timeout_ms),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    /// Load `url` for `unit` and return its source once `ready` matches.
    ///
    /// The timeout covers navigation and waiting together.
    pub async fn fetch(
        &self,
        session: &mut dyn Session,
        unit: &str,
        url: &str,
        ready: &Selector,
    ) -> Result<String> {
        let started = Instant::now();
        let timed_out = || ScrapeError::NavigationTimeout {
            unit: unit.to_string(),
            timeout: self.timeout,
        };

        tokio::time::timeout(self.timeout, session.navigate(url))
            .await
            .map_err(|_| timed_out())??;

        loop {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            let source = tokio::time::timeout(remaining, session.page_source())
                .await
                .map_err(|_| timed_out())??;

            if TableParser::contains(&source, ready) {
                debug!("{}: content ready after {}ms", unit, started.elapsed().as_millis());
                return Ok(source);
            }

            if started.elapsed() + self.poll_interval >= self.timeout {
                return Err(timed_out());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
