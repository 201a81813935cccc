//! Core types and trait definitions for the Glyph prediction service.
//!
//! This crate is deliberately free of HTTP, image-codec, inference-runtime and
//! database dependencies. Every other crate depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod classifier;
pub mod error;
pub mod record;
pub mod store;
pub mod tensor;

pub use error::{Error, Result};
