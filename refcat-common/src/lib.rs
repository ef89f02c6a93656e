//! # refcat Common Library
//!
//! Shared code for the refcat crates:
//! - Error types
//! - Configuration loading
//! - Tracing setup

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
