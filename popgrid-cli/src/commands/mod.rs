//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Cache management (stats, sweep, clear)
//! - [`config`] - Configuration management (init, path, show)
//! - [`run`] - Main command (run the population pipeline)

pub mod cache;
pub mod config;
pub mod run;
