//! Wire types for stockwatch.
//!
//! This crate contains the serde-serializable shapes that leave the process:
//! the cookie store, the status artifact, and the notification payload.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and small helpers
//! * Stable: Field names match the files operators and other tools read
//!
//! Watch logic built on top of these types lives in `stockwatch-cli`.

pub mod cookie;
pub mod notification;
pub mod status;

pub use cookie::*;
pub use notification::*;
pub use status::*;
