//! # teleport-core
//!
//! Core types shared by the Teleport `tctl` adapter crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and stable error codes
//! - [`config`] - Configuration for invoking `tctl` and locating node state on disk

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::TctlConfig;
pub use error::{Error, Result};
