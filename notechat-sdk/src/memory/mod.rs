//! # Long-term memory
//!
//! Per-user memories are delegated to a hosted memory service. The service
//! extracts facts from the messages it is given and answers semantic search
//! queries; this crate only moves data to and from it.
//!
//! - [`MemoryStore`]: operations the rest of the system depends on
//! - [`MemoryClient`]: the HTTP implementation
//! - [`MemoryRecord`]: what comes back

mod client;
mod types;

pub use client::{MemoryClient, MemoryConfig, MemoryStore};
pub use types::MemoryRecord;
