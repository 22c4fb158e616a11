//! # teleport-states
//!
//! Idempotent convergence checks on top of the `tctl` wrappers.
//!
//! A check observes the current state of a Teleport user, performs the corrective action when
//! the desired state is not met, and always answers with a [`StateResult`] report. Failures of
//! the underlying commands are folded into the report instead of being returned as errors.
//!
//! ## Modules
//!
//! - [`state`] - State reports and change records
//! - [`user`] - User presence checks and the [`UserDirectory`] capability they run against

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod state;
pub mod user;

pub use state::{Change, StateResult};
pub use user::{user_absent, user_present, UserDirectory};
