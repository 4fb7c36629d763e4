use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use slotscrape::config::Config;
use slotscrape::llm::OpenAiClient;
use slotscrape::persist::DatasetStore;
use slotscrape::pipeline::Pipeline;
use slotscrape::report::RunReport;
use slotscrape::session::{self, Backend};
use slotscrape::{ScrapeError, planner};

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slotscrape")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("slotscrape.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Units { term, refresh } => handle_units_command(term, *refresh, config).await,
        Commands::Scrape {
            term,
            concurrency,
            backend,
            refresh_units,
        } => handle_scrape_command(term, *concurrency, *backend, *refresh_units, config).await,
        Commands::Terms => handle_terms_command(config),
        Commands::Show { term, unit } => handle_show_command(term, unit.as_deref(), config),
        Commands::Plan { term, courses } => handle_plan_command(term, courses, config).await,
    }
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let factory = session::factory_from_config(&config.scrape)?;
    Ok(Pipeline::from_config(config, factory)?)
}

async fn handle_units_command(term: &str, refresh: bool, config: &Config) -> Result<()> {
    info!("Listing units for {} (refresh: {})", term, refresh);
    let pipeline = build_pipeline(config)?;
    let units = pipeline.units(term, refresh).await?;

    println!("{} {} units in {}", "Found:".green(), units.len(), term.cyan());
    for unit in &units {
        println!("  {}", unit);
    }
    Ok(())
}

async fn handle_scrape_command(
    term: &str,
    concurrency: Option<usize>,
    backend: Option<Backend>,
    refresh_units: bool,
    config: &Config,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(c) = concurrency {
        config.scrape.concurrency = c;
    }
    if let Some(b) = backend {
        config.scrape.backend = b;
    }
    config.validate()?;

    info!(
        "Scraping {} with {} workers on the {} backend",
        term, config.scrape.concurrency, config.scrape.backend
    );
    println!(
        "{} {} ({} workers, {} backend)",
        "Scraping:".green(),
        term.cyan(),
        config.scrape.concurrency,
        config.scrape.backend
    );

    let pipeline = build_pipeline(&config)?;
    let outcome = pipeline.run(term, refresh_units).await?;

    print_report(&outcome.report);
    println!(
        "{} {} units / {} courses written to {}",
        "Saved:".green(),
        outcome.dataset.units.len(),
        outcome.dataset.course_count(),
        outcome.path.display()
    );
    Ok(())
}

fn print_report(report: &RunReport) {
    let summary = format!("{}/{} units ok", report.units_succeeded, report.units_total);
    if report.is_clean() {
        println!("{} {}", "Report:".green(), summary);
    } else {
        println!("{} {}", "Report:".yellow(), summary);
    }

    for failure in &report.failures {
        println!("  {} {}: {}", "failed".red(), failure.unit, failure.message);
    }
    if !report.malformed_rows.is_empty() {
        println!("  {} {} malformed rows skipped", "warning".yellow(), report.malformed_rows.len());
    }
}

fn handle_terms_command(config: &Config) -> Result<()> {
    let store = DatasetStore::new(&config.storage.data_dir);
    let terms = store.terms()?;
    if terms.is_empty() {
        println!("No datasets in {}", store.dir().display());
        return Ok(());
    }
    for term in terms {
        println!("{}", term);
    }
    Ok(())
}

fn handle_show_command(term: &str, unit: Option<&str>, config: &Config) -> Result<()> {
    info!("Showing {} (unit: {:?})", term, unit);
    let store = DatasetStore::new(&config.storage.data_dir);
    let dataset = store.load(term)?;

    let json = match unit {
        Some(id) => {
            let unit = dataset
                .unit(id)
                .ok_or_else(|| ScrapeError::NotFound(format!("unit {} not in {}", id, term)))?;
            serde_json::to_string_pretty(unit)?
        }
        None => serde_json::to_string_pretty(&dataset.units)?,
    };
    println!("{}", json);
    Ok(())
}

async fn handle_plan_command(term: &str, courses: &[String], config: &Config) -> Result<()> {
    info!("Planning {} courses for {}", courses.len(), term);
    let store = DatasetStore::new(&config.storage.data_dir);
    let dataset = store.load(term)?;

    let timetables = planner::timetables(&dataset, courses);
    for missing in &timetables.missing {
        println!("{} no timetable found for {}", "warning".yellow(), missing);
    }

    let client = OpenAiClient::from_config(config.llm.clone())?;
    println!("{} querying {}...", "Planning:".green(), config.llm.model);
    let schedule = planner::plan(&client, &timetables, config.llm.max_tokens).await?;

    println!("\n{}\n\n{}", "Suggested Schedule:".bold(), schedule);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    config.validate().context("Invalid configuration")?;

    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    setup_logging(&level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
