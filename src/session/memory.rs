//! In-memory session backend for tests and dry runs
//!
//! Serves a fixed URL -> HTML map. URLs that are not in the map load a
//! placeholder page that never contains any content, which is how a page that
//! never finishes rendering looks to the fetcher.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{Session, SessionFactory};
use crate::error::{Result, ScrapeError};

const PLACEHOLDER: &str = "<html><body><p>Loading...</p></body></html>";

/// Open/close counters shared by all sessions of a factory.
#[derive(Debug, Default)]
pub struct SessionStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    navigations: AtomicUsize,
}

impl SessionStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

/// Factory for [`MemorySession`]s.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionFactory {
    pages: Arc<HashMap<String, String>>,
    late: Arc<HashMap<String, usize>>,
    failing_workers: Arc<HashSet<usize>>,
    latency: Duration,
    stats: Arc<SessionStats>,
}

impl MemorySessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` at `url`.
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.into(), html.into());
        self
    }

    /// Serve the placeholder for the first `polls` reads of `url`'s source.
    pub fn with_late_page(mut self, url: impl Into<String>, polls: usize) -> Self {
        Arc::make_mut(&mut self.late).insert(url.into(), polls);
        self
    }

    /// Make `open` fail for `worker`.
    pub fn failing_worker(mut self, worker: usize) -> Self {
        Arc::make_mut(&mut self.failing_workers).insert(worker);
        self
    }

    /// Delay every navigation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl SessionFactory for MemorySessionFactory {
    async fn open(&self, worker: usize) -> Result<Box<dyn Session>> {
        if self.failing_workers.contains(&worker) {
            return Err(ScrapeError::SessionInit {
                worker,
                message: "memory backend configured to fail".to_string(),
            });
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            factory: self.clone(),
            current: None,
            polls: 0,
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Session over a [`MemorySessionFactory`]'s pages.
pub struct MemorySession {
    factory: MemorySessionFactory,
    current: Option<String>,
    polls: usize,
    closed: bool,
}

#[async_trait]
impl Session for MemorySession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        if self.closed {
            return Err(ScrapeError::Navigation {
                url: url.to_string(),
                message: "session already closed".to_string(),
            });
        }
        if !self.factory.latency.is_zero() {
            tokio::time::sleep(self.factory.latency).await;
        }
        self.factory.stats.navigations.fetch_add(1, Ordering::SeqCst);
        self.current = Some(url.to_string());
        self.polls = 0;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String> {
        let Some(url) = &self.current else {
            return Ok(String::new());
        };
        self.polls += 1;

        let hold = self.factory.late.get(url).copied().unwrap_or(0);
        if self.polls <= hold {
            return Ok(PLACEHOLDER.to_string());
        }
        Ok(self
            .factory
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.factory.stats.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
