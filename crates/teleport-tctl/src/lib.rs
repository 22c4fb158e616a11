//! Typed wrappers around the Teleport `tctl` administration tool.
//!
//! Each wrapper runs one `tctl` subcommand, scrapes its fixed-format text output into typed
//! records and applies a uniform fail-hard policy to non-zero exits. Node enrollment tokens are
//! cached on disk so repeated configuration runs reuse a still-valid token.

#![deny(missing_docs)]

mod cache;
mod client;
mod enrollment;
mod models;
pub mod parser;
mod response;
mod runner;

pub use cache::{CacheGuard, TokenCache};
pub use client::{TctlClient, UNAVAILABLE_MESSAGE};
pub use enrollment::{EnrollmentPublisher, LocalPublisher, NodeEnrollment, TargetForm};
pub use models::{
    InviteResult, Node, NodeList, Token, TokenList, User, UserAddResult, UserDeleteResult,
    UserList, Version,
};
pub use response::{CallOptions, TctlResponse};
pub use runner::{CommandOutcome, CommandRequest, CommandRunner, ProcessRunner};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = teleport_core::Result<T>;
