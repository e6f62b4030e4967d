//! Page driver for stockwatch.
//!
//! The watch core talks to the shop page only through [`PageDriver`]. This
//! crate provides that trait and [`ChromeDriver`], an implementation that
//! launches (or attaches to) a Chromium-family browser and drives it over the
//! Chrome DevTools Protocol.
//!
//! Layers, leaves first:
//! - [`process`] and [`finder`]: executable discovery, port and pid helpers
//! - [`launcher`]: browser launch and `/json` endpoint probing
//! - [`connection`]: WebSocket JSON-RPC with id correlation and event broadcast
//! - [`selectors`]: selector configuration and the extraction scripts built from it
//! - [`chrome`]: the [`PageDriver`] implementation

pub mod chrome;
pub mod connection;
pub mod driver;
pub mod error;
pub mod finder;
pub mod launcher;
pub mod process;
pub mod selectors;

pub use chrome::{ChromeDriver, ChromeOptions, DriverTiming};
pub use driver::{Availability, AuthSignal, PageDriver, ProductSnapshot};
pub use error::{DriverError, Result};
pub use selectors::PageSelectors;
