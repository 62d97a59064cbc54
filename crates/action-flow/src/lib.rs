//! Cart operation orchestration
//!
//! Drives one "add item to cart" transaction per request through the
//! address, modal and cart-delta gates, with bounded retries, an optional
//! recovery port, a batch engine that serializes work per session, and a
//! per-batch report.

pub mod batch;
pub mod errors;
pub mod executor;
pub mod metrics;
pub mod recovery;
pub mod report;
pub mod strategies;
pub mod types;

pub use batch::*;
pub use errors::*;
pub use executor::*;
pub use recovery::*;
pub use report::*;
pub use strategies::*;
pub use types::*;
