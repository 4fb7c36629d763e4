//! Worker pool
//!
//! Fans unit identifiers out to at most `concurrency` workers. Each worker opens
//! one session, walks its assigned units in order against that session, and
//! closes it before returning, whatever happened to the units. Workers share no
//! mutable state; each unit's result is sent back as soon as it is done, so a
//! worker that dies later cannot take finished units down with it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use scraper::Selector;
use tokio::sync::mpsc;

use crate::config::SourceConfig;
use crate::domain::Unit;
use crate::error::{Result, ScrapeError};
use crate::fetcher::PageFetcher;
use crate::parser::TableParser;
use crate::report::{FailureKind, RowIssue, UnitFailure};
use crate::schema;
use crate::session::{Session, SessionFactory};

/// What one unit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitResult {
    pub unit: String,
    pub courses: Unit,
    pub failure: Option<UnitFailure>,
    pub skipped_rows: Vec<RowIssue>,
}

impl UnitResult {
    fn failed(unit: &str, failure: UnitFailure) -> Self {
        Self {
            unit: unit.to_string(),
            courses: Unit::new(),
            failure: Some(failure),
            skipped_rows: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Everything a worker needs, cloned into each task.
#[derive(Clone)]
struct WorkerContext {
    factory: Arc<dyn SessionFactory>,
    source: SourceConfig,
    fetcher: PageFetcher,
    parser: TableParser,
    ready: Selector,
    term: String,
}

/// How a worker ended. Unit results travel over the results channel.
struct WorkerOutput {
    session_opened: bool,
    /// Run-scoped error that stopped the worker early
    fatal: Option<ScrapeError>,
}

/// Bounded pool of scraping workers.
pub struct WorkerPool {
    factory: Arc<dyn SessionFactory>,
    source: SourceConfig,
    fetcher: PageFetcher,
    parser: TableParser,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        source: SourceConfig,
        fetcher: PageFetcher,
        concurrency: usize,
    ) -> Result<Self> {
        if concurrency == 0 {
            return Err(ScrapeError::Config("concurrency must be > 0".to_string()));
        }
        Ok(Self {
            factory,
            source,
            fetcher,
            parser: TableParser::new()?,
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Round-robin assignment of units to `workers` lists, duplicates dropped.
    pub fn assign(units: &[String], workers: usize) -> Vec<Vec<String>> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = units.iter().filter(|u| seen.insert(u.as_str())).collect();

        let workers = workers.min(unique.len()).max(1);
        let mut lists = vec![Vec::new(); workers];
        for (i, unit) in unique.into_iter().enumerate() {
            lists[i % workers].push(unit.clone());
        }
        lists.retain(|l| !l.is_empty());
        lists
    }

    /// Scrape every unit of `term`. Results come back in no particular order.
    ///
    /// Fails when not a single worker could open a session, or when a worker hit
    /// a run-scoped error.
    pub async fn run(&self, term: &str, units: &[String]) -> Result<Vec<UnitResult>> {
        let assignments = Self::assign(units, self.concurrency);
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let ctx = WorkerContext {
            factory: self.factory.clone(),
            source: self.source.clone(),
            fetcher: self.fetcher.clone(),
            parser: self.parser.clone(),
            ready: schema::compile(schema::BLOCK_SELECTOR)?,
            term: term.to_string(),
        };

        log::info!(
            "Scraping {} units of {} with {} workers ({} backend)",
            assignments.iter().map(Vec::len).sum::<usize>(),
            term,
            assignments.len(),
            self.factory.name()
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handles: Vec<_> = assignments
            .iter()
            .enumerate()
            .map(|(worker, units)| {
                let ctx = ctx.clone();
                let units = units.clone();
                let tx = tx.clone();
                tokio::spawn(async move { run_worker(ctx, worker, units, tx).await })
            })
            .collect();
        drop(tx);

        let joined = join_all(handles).await;

        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        let reported: HashSet<String> = results.iter().map(|r: &UnitResult| r.unit.clone()).collect();

        let mut any_session = false;
        let mut fatal = None;
        let mut lost = Vec::new();
        for (worker, joined) in joined.into_iter().enumerate() {
            match joined {
                Ok(output) => {
                    any_session |= output.session_opened;
                    if fatal.is_none() {
                        fatal = output.fatal;
                    }
                }
                Err(e) => {
                    // A panicked worker got past session init.
                    any_session = true;
                    tracing::error!(worker, error = %e, "worker task failed");
                    let message = format!("worker {} task failed: {}", worker, e);
                    lost.extend(
                        assignments[worker]
                            .iter()
                            .filter(|unit| !reported.contains(unit.as_str()))
                            .map(|unit| {
                                UnitResult::failed(
                                    unit,
                                    UnitFailure {
                                        unit: unit.clone(),
                                        kind: FailureKind::WorkerPanic,
                                        message: message.clone(),
                                    },
                                )
                            }),
                    );
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        if !any_session {
            return Err(ScrapeError::NoSessions);
        }
        results.extend(lost);
        Ok(results)
    }
}

/// Keep a unit- or row-scoped error as that unit's failure; hand back anything
/// that reaches further.
fn absorb(unit: &str, err: ScrapeError) -> Result<UnitResult> {
    if err.is_fatal() {
        return Err(err);
    }
    Ok(UnitResult::failed(unit, UnitFailure::from_error(unit, &err)))
}

async fn run_worker(
    ctx: WorkerContext,
    worker: usize,
    units: Vec<String>,
    tx: mpsc::UnboundedSender<UnitResult>,
) -> WorkerOutput {
    let mut session = match ctx.factory.open(worker).await {
        Ok(session) => session,
        Err(e) => {
            let err = if matches!(e, ScrapeError::SessionInit { .. }) {
                e
            } else {
                ScrapeError::SessionInit {
                    worker,
                    message: e.to_string(),
                }
            };
            tracing::warn!(worker, units = units.len(), error = %err, "session init failed, skipping assigned units");
            for unit in &units {
                let _ = tx.send(UnitResult::failed(unit, UnitFailure::from_error(unit.as_str(), &err)));
            }
            return WorkerOutput {
                session_opened: false,
                fatal: None,
            };
        }
    };

    tracing::info!(worker, units = units.len(), "worker started");

    let mut fatal = None;
    for unit in &units {
        match scrape_unit(&ctx, session.as_mut(), worker, unit).await {
            Ok(result) => {
                let _ = tx.send(result);
            }
            Err(e) => {
                tracing::error!(worker, unit = unit.as_str(), error = %e, "run-scoped error, stopping worker");
                fatal = Some(e);
                break;
            }
        }
    }

    if let Err(e) = session.close().await {
        tracing::warn!(worker, error = %e, "failed to close session");
    }
    tracing::info!(worker, "worker finished");

    WorkerOutput {
        session_opened: true,
        fatal,
    }
}

async fn scrape_unit(
    ctx: &WorkerContext,
    session: &mut dyn Session,
    worker: usize,
    unit: &str,
) -> Result<UnitResult> {
    let started = Instant::now();
    let url = ctx.source.unit_url(&ctx.term, unit);

    match ctx.fetcher.fetch(session, unit, &url, &ctx.ready).await {
        Ok(html) => {
            let page = ctx.parser.parse(unit, &html);
            tracing::debug!(
                worker,
                unit,
                courses = page.unit.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "unit scraped"
            );
            Ok(UnitResult {
                unit: unit.to_string(),
                courses: page.unit,
                failure: None,
                skipped_rows: page.skipped,
            })
        }
        Err(e) => {
            tracing::warn!(worker, unit, error = %e, "unit failed");
            absorb(unit, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionFactory;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Wraps memory sessions: `/boom` panics the worker, `/broken` fails with
    /// a run-scoped error.
    struct TripwireFactory(MemorySessionFactory);

    struct Tripwire(Box<dyn Session>);

    #[async_trait]
    impl SessionFactory for TripwireFactory {
        async fn open(&self, worker: usize) -> Result<Box<dyn Session>> {
            Ok(Box::new(Tripwire(self.0.open(worker).await?)))
        }

        fn name(&self) -> &str {
            "tripwire"
        }
    }

    #[async_trait]
    impl Session for Tripwire {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            if url.ends_with("/boom") {
                panic!("session crashed loading {}", url);
            }
            if url.ends_with("/broken") {
                return Err(ScrapeError::Io(std::io::Error::other("profile directory vanished")));
            }
            self.0.navigate(url).await
        }

        async fn page_source(&mut self) -> Result<String> {
            self.0.page_source().await
        }

        async fn close(&mut self) -> Result<()> {
            self.0.close().await
        }
    }

    fn tripwire_pool(factory: MemorySessionFactory) -> WorkerPool {
        let source = SourceConfig {
            base_url: BASE.to_string(),
        };
        let fetcher = PageFetcher::new(Duration::from_millis(40), Duration::from_millis(5));
        WorkerPool::new(Arc::new(TripwireFactory(factory)), source, fetcher, 1).unwrap()
    }

    const BASE: &str = "http://schedule.test/class-schedule";

    fn units(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn unit_page(course: &str) -> String {
        format!(
            r#"<html><body><div class="table"><h2>{} - Title</h2>
            <div role="row"><span>h</span></div>
            <div role="row"><span>1</span><span>01</span><span>LEC</span><span>MW</span><span>R</span><span>09:00</span><span>10:15</span></div>
            </div></body></html>"#,
            course
        )
    }

    fn pool(factory: MemorySessionFactory, concurrency: usize) -> WorkerPool {
        let source = SourceConfig {
            base_url: BASE.to_string(),
        };
        let fetcher = PageFetcher::new(Duration::from_millis(40), Duration::from_millis(5));
        WorkerPool::new(Arc::new(factory), source, fetcher, concurrency).unwrap()
    }

    #[test]
    fn test_assign_round_robin() {
        let lists = WorkerPool::assign(&units(&["a", "b", "c", "d", "e"]), 2);
        assert_eq!(lists, vec![units(&["a", "c", "e"]), units(&["b", "d"])]);
    }

    #[test]
    fn test_assign_caps_workers_and_dedups() {
        let lists = WorkerPool::assign(&units(&["a", "b", "a"]), 8);
        assert_eq!(lists, vec![units(&["a"]), units(&["b"])]);
        assert!(WorkerPool::assign(&[], 4).is_empty());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let source = SourceConfig::default();
        let fetcher = PageFetcher::new(Duration::from_millis(10), Duration::from_millis(1));
        let result = WorkerPool::new(Arc::new(MemorySessionFactory::new()), source, fetcher, 0);
        assert!(matches!(result, Err(ScrapeError::Config(_))));
    }

    #[tokio::test]
    async fn test_sessions_opened_once_per_worker_and_closed() {
        let factory = MemorySessionFactory::new()
            .with_page(format!("{}/t/a", BASE), unit_page("A 1"))
            .with_page(format!("{}/t/b", BASE), unit_page("B 1"))
            .with_page(format!("{}/t/c", BASE), unit_page("C 1"));
        let stats = factory.stats();

        let results = pool(factory, 2).run("t", &units(&["a", "b", "c"])).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(UnitResult::is_ok));
        assert_eq!(stats.opened(), 2);
        assert_eq!(stats.closed(), 2);
        assert_eq!(stats.navigations(), 3);
    }

    #[tokio::test]
    async fn test_timeout_isolated_to_unit() {
        let factory = MemorySessionFactory::new()
            .with_page(format!("{}/t/a", BASE), unit_page("A 1"))
            .with_page(format!("{}/t/c", BASE), unit_page("C 1"));
        let stats = factory.stats();

        // Single worker: "b" times out, "c" still runs on the same session.
        let results = pool(factory, 1).run("t", &units(&["a", "b", "c"])).await.unwrap();
        let b = results.iter().find(|r| r.unit == "b").unwrap();
        assert_eq!(b.failure.as_ref().unwrap().kind, FailureKind::NavigationTimeout);
        assert!(b.courses.is_empty());
        let c = results.iter().find(|r| r.unit == "c").unwrap();
        assert!(c.is_ok());
        assert_eq!(c.courses.course("C1").unwrap().len(), 1);
        assert_eq!(stats.closed(), 1);
    }

    #[tokio::test]
    async fn test_session_init_failure_affects_only_that_worker() {
        let factory = MemorySessionFactory::new()
            .with_page(format!("{}/t/a", BASE), unit_page("A 1"))
            .with_page(format!("{}/t/b", BASE), unit_page("B 1"))
            .with_page(format!("{}/t/c", BASE), unit_page("C 1"))
            .failing_worker(1);

        // Worker 0 gets a and c, worker 1 gets b.
        let results = pool(factory, 2).run("t", &units(&["a", "b", "c"])).await.unwrap();
        assert_eq!(results.len(), 3);
        let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).map(|r| r.unit.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
        let b = results.iter().find(|r| r.unit == "b").unwrap();
        assert_eq!(b.failure.as_ref().unwrap().kind, FailureKind::SessionInit);
        assert!(b.courses.is_empty());
    }

    #[tokio::test]
    async fn test_all_sessions_failing_is_fatal() {
        let factory = MemorySessionFactory::new().failing_worker(0).failing_worker(1);
        let result = pool(factory, 2).run("t", &units(&["a", "b"])).await;
        assert!(matches!(result, Err(ScrapeError::NoSessions)));
    }

    #[tokio::test]
    async fn test_empty_unit_list() {
        let results = pool(MemorySessionFactory::new(), 4).run("t", &[]).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_worker_panic_keeps_finished_units() {
        let factory = MemorySessionFactory::new()
            .with_page(format!("{}/t/a", BASE), unit_page("A 1"))
            .with_page(format!("{}/t/c", BASE), unit_page("C 1"));

        let results = tripwire_pool(factory).run("t", &units(&["a", "boom", "c"])).await.unwrap();
        assert_eq!(results.len(), 3);

        let a = results.iter().find(|r| r.unit == "a").unwrap();
        assert!(a.is_ok());
        assert_eq!(a.courses.course("A1").unwrap().len(), 1);
        for unit in ["boom", "c"] {
            let r = results.iter().find(|r| r.unit == unit).unwrap();
            assert_eq!(r.failure.as_ref().unwrap().kind, FailureKind::WorkerPanic);
        }
    }

    #[tokio::test]
    async fn test_run_scoped_error_propagates() {
        let factory = MemorySessionFactory::new()
            .with_page(format!("{}/t/a", BASE), unit_page("A 1"))
            .with_page(format!("{}/t/c", BASE), unit_page("C 1"));
        let stats = factory.stats();

        let result = tripwire_pool(factory).run("t", &units(&["a", "broken", "c"])).await;
        assert!(matches!(result, Err(ScrapeError::Io(_))));
        assert_eq!(stats.closed(), 1);
        assert_eq!(stats.navigations(), 1);
    }

    #[test]
    fn test_absorb_keeps_unit_errors_and_returns_fatal_ones() {
        let timeout = ScrapeError::NavigationTimeout {
            unit: "b".to_string(),
            timeout: Duration::from_millis(10),
        };
        let absorbed = absorb("b", timeout).unwrap();
        assert_eq!(absorbed.failure.unwrap().kind, FailureKind::NavigationTimeout);

        let fatal = absorb("b", ScrapeError::Schema("bad selector".to_string()));
        assert!(matches!(fatal, Err(ScrapeError::Schema(_))));
    }
}
