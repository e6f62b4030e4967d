//! Availability polling and product-identity verification.

pub mod poller;
pub mod similarity;

pub use poller::AvailabilityPoller;
pub use similarity::{MatchPolicy, similarity};

/// A product that passed both identity gates in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAvailability {
	pub cycle: u32,
	pub check: u64,
	pub product_name: String,
	pub similarity: f64,
	pub cart_similarity: f64,
}

impl VerifiedAvailability {
	/// Identifies the verified event; one notification per key.
	pub fn event_key(&self) -> (u32, u64) {
		(self.cycle, self.check)
	}
}

/// Why a cycle ended without a purchase on policy grounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
	OutOfStock,
}

impl StopReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::OutOfStock => "out_of_stock",
		}
	}

	pub fn describe(self) -> &'static str {
		match self {
			Self::OutOfStock => "the product is out of stock",
		}
	}
}

/// Result of one poller run.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
	/// Both identity gates passed and the item sits in the cart.
	Purchased(VerifiedAvailability),
	StoppedByUser(StopReason),
	Error(String),
}

impl WatchOutcome {
	pub fn is_purchased(&self) -> bool {
		matches!(self, Self::Purchased(_))
	}
}
