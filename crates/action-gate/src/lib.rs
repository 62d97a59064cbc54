//! Verification gates - trust state, not click results
//!
//! This crate implements the checks the cart engine runs around every
//! cart-mutating action:
//! - Address verification and the "change address" correction sub-flow
//! - Polling for interstitial overlays that queue an in-flight action
//! - Cart snapshots and before/after delta computation
//! - Text matching rules (postal code extraction, option ranking, fragments)

pub mod address;
pub mod cart;
pub mod context;
pub mod errors;
pub mod matching;
pub mod modal;
pub mod types;

pub use address::*;
pub use cart::*;
pub use context::*;
pub use errors::*;
pub use matching::*;
pub use modal::*;
pub use types::*;
