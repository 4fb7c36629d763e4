//! CLI module for slotscrape - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
