//! Common utilities and types shared across Skyshelf crates.
//!
//! This module provides the error taxonomy every storage provider reports
//! through, plus the object path and secret wrappers used in configuration.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ObjectPath, Secret};
