//! Channel lifecycle, access control and the live channel registry.
//!
//! Everything here is synchronous and may block on SQLite. Async callers
//! should run these operations on a blocking worker (`spawn_blocking`).

pub mod channel;
pub mod engine;
pub mod error;
pub mod registry;

pub use channel::Channel;
pub use engine::AccessEngine;
pub use error::{CoreError, Result};
pub use registry::ChannelRegistry;
