//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - units: discover (or show cached) units for a term
//! - scrape: full run for a term
//! - terms: list persisted terms
//! - show: print a stored dataset
//! - plan: hand required courses to the completion endpoint

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use slotscrape::session::Backend;

/// Slotscrape - concurrent class-schedule scraper
#[derive(Parser, Debug)]
#[command(name = "slotscrape")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the units offered in a term
    Units {
        /// Term identifier, e.g. fall-2024
        term: String,

        /// Rediscover instead of using the cached list
        #[arg(short, long)]
        refresh: bool,
    },

    /// Scrape every unit of a term and publish the dataset
    Scrape {
        /// Term identifier, e.g. fall-2024
        term: String,

        /// Number of concurrent sessions
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Session backend
        #[arg(short, long, value_enum)]
        backend: Option<Backend>,

        /// Rediscover units before scraping
        #[arg(long)]
        refresh_units: bool,
    },

    /// List terms with a stored dataset
    Terms,

    /// Print a stored dataset, or one unit of it
    Show {
        /// Term identifier
        term: String,

        /// Unit to show
        unit: Option<String>,
    },

    /// Ask the completion endpoint for a non-overlapping schedule
    Plan {
        /// Term identifier
        term: String,

        /// Required courses, e.g. "ECON 100A"
        #[arg(required = true)]
        courses: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["slotscrape"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["slotscrape", "-v", "-c", "/tmp/s.yml", "terms", "--data-dir", "/tmp/d"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.yml")));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/d")));
        assert!(matches!(cli.command, Commands::Terms));
    }

    #[test]
    fn test_units_command() {
        let cli = Cli::try_parse_from(["slotscrape", "units", "fall-2024", "--refresh"]).unwrap();
        match cli.command {
            Commands::Units { term, refresh } => {
                assert_eq!(term, "fall-2024");
                assert!(refresh);
            }
            _ => panic!("Expected units command"),
        }
    }

    #[test]
    fn test_scrape_defaults() {
        let cli = Cli::try_parse_from(["slotscrape", "scrape", "fall-2024"]).unwrap();
        match cli.command {
            Commands::Scrape {
                term,
                concurrency,
                backend,
                refresh_units,
            } => {
                assert_eq!(term, "fall-2024");
                assert!(concurrency.is_none());
                assert!(backend.is_none());
                assert!(!refresh_units);
            }
            _ => panic!("Expected scrape command"),
        }
    }

    #[test]
    fn test_scrape_with_options() {
        let cli =
            Cli::try_parse_from(["slotscrape", "scrape", "fall-2024", "-j", "8", "--backend", "chrome", "--refresh-units"])
                .unwrap();
        match cli.command {
            Commands::Scrape {
                concurrency,
                backend,
                refresh_units,
                ..
            } => {
                assert_eq!(concurrency, Some(8));
                assert_eq!(backend, Some(Backend::Chrome));
                assert!(refresh_units);
            }
            _ => panic!("Expected scrape command"),
        }
    }

    #[test]
    fn test_show_command() {
        let cli = Cli::try_parse_from(["slotscrape", "show", "fall-2024", "econ"]).unwrap();
        match cli.command {
            Commands::Show { term, unit } => {
                assert_eq!(term, "fall-2024");
                assert_eq!(unit.as_deref(), Some("econ"));
            }
            _ => panic!("Expected show command"),
        }
    }

    #[test]
    fn test_plan_command() {
        let cli = Cli::try_parse_from(["slotscrape", "plan", "fall-2024", "ECON 100A", "math45"]).unwrap();
        match cli.command {
            Commands::Plan { term, courses } => {
                assert_eq!(term, "fall-2024");
                assert_eq!(courses, vec!["ECON 100A".to_string(), "math45".to_string()]);
            }
            _ => panic!("Expected plan command"),
        }
    }

    #[test]
    fn test_plan_requires_courses() {
        assert!(Cli::try_parse_from(["slotscrape", "plan", "fall-2024"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
