//! Action primitives - bounded browser operations
//!
//! This crate provides the building blocks the cart engine drives a session with:
//! - The `Automation` capability interface supplied by the remote collaborator
//! - 5 primitives behind `ActionPrimitives`: navigate, click, type, read, wait
//! - Per-call deadlines and cooperative cancellation via `ExecCtx`
//! - Bounded polling for conditions that appear with a delay
//! - `UiAgentClient`, the HTTP transport to the UI-agent service

pub mod automation;
pub mod errors;
mod primitives;
pub mod remote;
pub mod types;
mod waiting;

pub use automation::*;
pub use errors::*;
pub use primitives::*;
pub use remote::*;
pub use types::*;
pub use waiting::*;
