//! Command-line front end for flexstack.
//!
//! Resolves deployment parameters from a JSON file, flags, and environment
//! variables, then prints names, plans, or simulated deployment outputs.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod cli;
pub mod commands;
pub mod error;

pub use error::CliError;
