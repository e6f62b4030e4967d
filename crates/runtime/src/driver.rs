//! The page-driver seam between the watch core and a real browser.

use async_trait::async_trait;
use stockwatch_protocol::Cookie;

use crate::error::Result;

/// Purchasability of the product as read from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
	/// An enabled add-to-cart control is present.
	Available,
	/// Out-of-stock markers are present or the add control is disabled.
	OutOfStock,
	/// The page announces the product as upcoming; not yet purchasable.
	ComingSoon,
	/// None of the known markers matched.
	Unknown,
}

impl Availability {
	/// Parses the classification string returned by the extraction script.
	pub fn from_script(value: &str) -> Self {
		match value {
			"available" => Self::Available,
			"out_of_stock" => Self::OutOfStock,
			"coming_soon" => Self::ComingSoon,
			_ => Self::Unknown,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Available => "available",
			Self::OutOfStock => "out_of_stock",
			Self::ComingSoon => "coming_soon",
			Self::Unknown => "unknown",
		}
	}
}

impl std::fmt::Display for Availability {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Fields extracted from one product page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
	pub name: String,
	pub availability: Availability,
}

/// Independent indicators that the browser holds an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSignal {
	/// Account UI present, or the login control absent on a loaded page.
	UiIndicator,
	/// A token-like key exists in local or session storage.
	StorageToken,
	/// A login-gated resource answers without redirecting.
	GatedContent,
}

impl AuthSignal {
	pub const ALL: [AuthSignal; 3] = [AuthSignal::UiIndicator, AuthSignal::StorageToken, AuthSignal::GatedContent];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::UiIndicator => "ui_indicator",
			Self::StorageToken => "storage_token",
			Self::GatedContent => "gated_content",
		}
	}
}

impl std::fmt::Display for AuthSignal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Browser operations the watch core depends on.
///
/// Every method is a suspension point. Implementations report page-level
/// trouble as [`DriverError::Navigation`](crate::DriverError::Navigation) or
/// [`DriverError::Extraction`](crate::DriverError::Extraction) so callers can
/// treat it as transient.
#[async_trait]
pub trait PageDriver: Send + Sync {
	/// Loads `url` in the active page.
	async fn navigate(&self, url: &str) -> Result<()>;

	/// Loads `url` and extracts the product name and availability.
	async fn load_product(&self, url: &str) -> Result<ProductSnapshot>;

	/// Clicks the add-to-cart control on the current product page.
	async fn add_to_cart(&self) -> Result<()>;

	/// Opens the cart and returns the names of the items it lists.
	async fn cart_items(&self) -> Result<Vec<String>>;

	/// Evaluates one authentication signal against the current page.
	async fn probe(&self, signal: AuthSignal) -> Result<bool>;

	/// Returns every cookie the browser holds.
	async fn cookies(&self) -> Result<Vec<Cookie>>;

	/// Installs `cookies` into the browser.
	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;

	/// Selects the saved delivery address labelled `label`; `false` if not found.
	async fn select_location(&self, label: &str) -> Result<bool>;

	/// Shuts the browser session down.
	async fn close(&self) -> Result<()>;
}
