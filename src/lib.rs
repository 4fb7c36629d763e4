//! Slotscrape - concurrent class-schedule scraper
//!
//! Discovers the academic units offered in a term, scrapes each unit's course
//! tables with a pool of independent page sessions, and publishes one
//! deterministic JSON dataset per term. Downstream, [`planner`] hands a set of
//! required courses to a completion endpoint to pick a non-overlapping schedule.

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod llm;
pub mod parser;
pub mod persist;
pub mod pipeline;
pub mod planner;
pub mod pool;
pub mod report;
pub mod schema;
pub mod session;

pub use error::{Result, ScrapeError};
