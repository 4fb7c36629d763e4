//! Scrape pipeline
//!
//! discover -> worker pool -> aggregate -> persist. Only discovery, the loss of
//! every session, run-scoped errors and persistence can fail a run; everything
//! below that is recorded in the run report.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use crate::aggregate::Aggregator;
use crate::config::{Config, SourceConfig};
use crate::discovery::UnitDiscovery;
use crate::domain::Dataset;
use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::persist::{DatasetStore, validate_term};
use crate::pool::WorkerPool;
use crate::report::RunReport;
use crate::session::SessionFactory;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub dataset: Dataset,
    pub report: RunReport,
    pub path: PathBuf,
}

/// Wires discovery, the pool and the store together for one data source.
pub struct Pipeline {
    factory: Arc<dyn SessionFactory>,
    discovery: UnitDiscovery,
    pool: WorkerPool,
    store: DatasetStore,
}

impl Pipeline {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        source: SourceConfig,
        fetcher: PageFetcher,
        concurrency: usize,
        store: DatasetStore,
    ) -> Result<Self> {
        Ok(Self {
            discovery: UnitDiscovery::new(source.clone(), fetcher.clone())?,
            pool: WorkerPool::new(factory.clone(), source, fetcher, concurrency)?,
            factory,
            store,
        })
    }

    pub fn from_config(config: &Config, factory: Arc<dyn SessionFactory>) -> Result<Self> {
        Self::new(
            factory,
            config.source.clone(),
            PageFetcher::from_config(&config.scrape.fetch),
            config.scrape.concurrency,
            DatasetStore::new(&config.storage.data_dir),
        )
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Discover units from the index page and refresh the cached list.
    pub async fn discover(&self, term: &str) -> Result<Vec<String>> {
        validate_term(term)?;
        let units = self.discovery.discover(self.factory.as_ref(), term).await?;
        if let Err(e) = self.store.save_units(term, &units) {
            warn!("Could not cache unit list for {}: {}", term, e);
        }
        Ok(units)
    }

    /// Cached units for `term`, discovering them when absent or when `refresh`.
    pub async fn units(&self, term: &str, refresh: bool) -> Result<Vec<String>> {
        if !refresh {
            match self.store.load_units(term) {
                Ok(Some(units)) if !units.is_empty() => {
                    info!("Using {} cached units for {}", units.len(), term);
                    return Ok(units);
                }
                Ok(_) => {}
                Err(e) => warn!("Ignoring unreadable unit cache for {}: {}", term, e),
            }
        }
        self.discover(term).await
    }

    /// Scrape `units` and aggregate, without persisting.
    pub async fn scrape(&self, term: &str, units: &[String]) -> Result<(Dataset, RunReport)> {
        validate_term(term)?;
        let started_at = Utc::now();
        let results = self.pool.run(term, units).await?;

        let mut aggregator = Aggregator::new(term);
        for result in results {
            aggregator.add(result);
        }
        Ok(aggregator.finish(self.pool.concurrency(), started_at))
    }

    /// Full run: units, scrape, then publish dataset and report.
    pub async fn run(&self, term: &str, refresh_units: bool) -> Result<RunOutcome> {
        let units = self.units(term, refresh_units).await?;
        let (dataset, report) = self.scrape(term, &units).await?;

        let path = self.store.save(&dataset)?;
        if let Err(e) = self.store.save_report(&report) {
            warn!("Could not write run report for {}: {}", term, e);
        }

        info!(
            "Run for {} finished: {}/{} units ok, {} rows skipped",
            term,
            report.units_succeeded,
            report.units_total,
            report.malformed_rows.len()
        );
        Ok(RunOutcome { dataset, report, path })
    }
}
