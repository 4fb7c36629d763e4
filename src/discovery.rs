//! Unit discovery
//!
//! Loads the term index page once and collects the unit identifiers it links to.
//! Any failure here is fatal to the run: without units there is nothing to scrape.

use log::info;

use crate::config::SourceConfig;
use crate::error::{Result, ScrapeError};
use crate::fetcher::PageFetcher;
use crate::parser::TableParser;
use crate::schema;
use crate::session::SessionFactory;

/// Discovers the units of a term from its index page.
#[derive(Debug, Clone)]
pub struct UnitDiscovery {
    source: SourceConfig,
    fetcher: PageFetcher,
    parser: TableParser,
}

impl UnitDiscovery {
    pub fn new(source: SourceConfig, fetcher: PageFetcher) -> Result<Self> {
        Ok(Self {
            source,
            fetcher,
            parser: TableParser::new()?,
        })
    }

    /// Ordered, de-duplicated unit identifiers for `term`.
    pub async fn discover(&self, factory: &dyn SessionFactory, term: &str) -> Result<Vec<String>> {
        let url = self.source.index_url(term);
        let prefix = self.source.path_prefix(term)?;
        let ready = schema::compile(schema::LINK_SELECTOR)?;

        info!("Discovering units for {} from {}", term, url);

        let mut session = factory
            .open(0)
            .await
            .map_err(|e| ScrapeError::Discovery(format!("could not open session: {}", e)))?;

        let fetched = self.fetcher.fetch(session.as_mut(), term, &url, &ready).await;
        if let Err(e) = session.close().await {
            log::warn!("Failed to close discovery session: {}", e);
        }

        let html = fetched.map_err(|e| ScrapeError::Discovery(format!("index page {}: {}", url, e)))?;
        let units = self.parser.unit_links(&html, &prefix);
        if units.is_empty() {
            return Err(ScrapeError::Discovery(format!("no unit links under {} on {}", prefix, url)));
        }

        info!("{} units found for {}", units.len(), term);
        Ok(units)
    }
}
