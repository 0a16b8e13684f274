//! # Contracts
//!
//! Frozen interface contracts shared by the shipper crates.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `LogEvent::timestamp` is wall-clock milliseconds since the Unix epoch
//! - Order inside a batch is enqueue order, never re-sorted

mod config;
mod error;
mod event;
mod sink;

pub use config::*;
pub use error::*;
pub use event::*;
pub use sink::*;
