//! Stock watcher core: session authentication, availability polling with
//! double identity verification, notification dispatch, and the retry loop.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod pace;
pub mod retry;
pub mod session;
pub mod status;
pub mod store;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;
