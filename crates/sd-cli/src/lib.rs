//! # sd-cli
//!
//! Command-line administration for the staff directory.
//!
//! This crate provides the `sdctl` binary for:
//! - User lookup, search, username suggestions and lifecycle changes
//! - Group inspection and membership changes
//! - The unmaintained-accounts report and its notifications
//! - Distinct-value listings and a connection check

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
