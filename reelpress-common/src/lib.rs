//! # reelpress Common Library
//!
//! Shared code for the reelpress export service:
//! - Error types
//! - Configuration file loading
//! - Path and identifier sanitization
//! - Session id generation

pub mod config;
pub mod error;
pub mod id_utils;
pub mod sanitize;

pub use error::{Error, Result};
pub use sanitize::{sanitize_filename, sanitize_id};
