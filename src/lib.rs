//! cartpilot command-line front end
//!
//! Exposes modules for integration testing

pub mod cli;
pub mod config;
pub mod metrics;

pub use config::Config;
