//! JSON-file backend for the Glyph prediction log.
//!
//! The whole log is one pretty-printed JSON array, newest record first.
//! Blocking file work runs on tokio's blocking pool so callers on the async
//! runtime are never stalled by disk I/O or lock waits.

mod encode;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::FileStore;
