//! Locator tables - semantic targets resolved to candidate handles
//!
//! This crate implements platform-keyed element location with:
//! - Semantic targets ("add-to-cart button", "cart count", "address link")
//! - Per-platform tables loaded from YAML, with a built-in amazon table
//! - Ordered candidate lists, most specific first; empty when nothing is known
//! - Resolution helpers walking the candidate chain through action primitives

pub mod errors;
pub mod resolver;
pub mod tables;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use tables::*;
pub use types::*;
