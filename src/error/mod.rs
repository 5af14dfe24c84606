//! Error handling
//!
//! Defines error types and failure reporting for the storage layer.

pub mod handlers;
pub mod types;

pub use types::*;
