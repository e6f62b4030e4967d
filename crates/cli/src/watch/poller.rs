//! One watch cycle: load, classify, verify, cart, verify again.

use serde_json::json;
use stockwatch_protocol::WatchStatus;
use stockwatch_runtime::{Availability, DriverError, PageDriver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::similarity::{MatchPolicy, similarity};
use super::{StopReason, VerifiedAvailability, WatchOutcome};
use crate::config::{PollPolicy, WatchParameters};
use crate::error::{SessionError, WatchError};
use crate::pace;
use crate::session::SessionManager;
use crate::status::StatusReporter;

/// What to do with a failed driver call inside the loop.
enum Step {
	Skip,
	Stop(WatchOutcome),
}

pub struct AvailabilityPoller<'a> {
	driver: &'a dyn PageDriver,
	status: &'a StatusReporter,
	params: &'a WatchParameters,
	matcher: MatchPolicy,
	auth_recheck_every: u64,
	cycle: u32,
}

impl<'a> AvailabilityPoller<'a> {
	pub fn new(driver: &'a dyn PageDriver, status: &'a StatusReporter, params: &'a WatchParameters, policy: PollPolicy, cycle: u32) -> Self {
		Self {
			driver,
			status,
			params,
			matcher: MatchPolicy::new(policy.match_threshold),
			auth_recheck_every: policy.auth_recheck_every,
			cycle,
		}
	}

	/// Polls until the product is verified in the cart, the out-of-stock
	/// policy stops the cycle, or a non-recoverable driver error occurs.
	///
	/// Only fatal session errors and interrupts are returned as `Err`.
	pub async fn run(&self, session: &mut SessionManager, cancel: &CancellationToken) -> Result<WatchOutcome, WatchError> {
		if let Some(outcome) = self.authenticate(session, cancel, 0).await? {
			return Ok(outcome);
		}

		self.status.report(
			WatchStatus::Monitoring,
			0,
			[
				("cycle", json!(self.cycle)),
				("location", json!(self.params.location_label)),
				("check_interval_seconds", json!(self.params.check_interval_seconds)),
			],
		);
		self.select_location(cancel).await?;

		let mut target = self.params.target_product_label.trim().to_string();
		let mut check: u64 = 0;
		loop {
			if check > 0 {
				pace::sleep(cancel, self.params.check_interval()).await?;
			}
			check += 1;

			if check > 1 && self.auth_recheck_every > 0 && (check - 1) % self.auth_recheck_every == 0 {
				if let Some(outcome) = self.authenticate(session, cancel, check).await? {
					return Ok(outcome);
				}
			}

			let snapshot = match pace::guard(cancel, self.driver.load_product(&self.params.target_url)).await? {
				Ok(snapshot) => snapshot,
				Err(e) => match self.driver_failure(e, check, "load product") {
					Step::Skip => continue,
					Step::Stop(outcome) => return Ok(outcome),
				},
			};

			if target.is_empty() && !snapshot.name.trim().is_empty() {
				target = snapshot.name.trim().to_string();
				info!(target = "stockwatch.watch", product = %target, "watching the product shown on the page");
			}

			match snapshot.availability {
				Availability::Available => {}
				Availability::Unknown => {
					debug!(target = "stockwatch.watch", check, "availability unknown");
					continue;
				}
				Availability::ComingSoon => {
					info!(target = "stockwatch.watch", check, product = %snapshot.name, "coming soon");
					continue;
				}
				Availability::OutOfStock if self.params.continue_on_out_of_stock => {
					info!(target = "stockwatch.watch", check, product = %snapshot.name, "out of stock, still watching");
					continue;
				}
				Availability::OutOfStock => {
					let reason = StopReason::OutOfStock;
					info!(target = "stockwatch.watch", check, product = %snapshot.name, "out of stock, stopping");
					self.status.report(
						WatchStatus::Stopped,
						check,
						[("reason", json!(reason.as_str())), ("product_name", json!(snapshot.name))],
					);
					return Ok(WatchOutcome::StoppedByUser(reason));
				}
			}

			let score = similarity(&snapshot.name, &target);
			if !self.matcher.is_match(score) {
				warn!(
					target = "stockwatch.watch",
					check,
					observed = %snapshot.name,
					expected = %target,
					similarity = score,
					"IdentityMismatch: available product is not the target, not adding to cart"
				);
				continue;
			}

			info!(target = "stockwatch.watch", check, product = %snapshot.name, similarity = score, "product available");
			self.status.report(
				WatchStatus::Available,
				check,
				[("product_name", json!(snapshot.name)), ("similarity", json!(score)), ("check", json!(check))],
			);

			if let Some(outcome) = self.authenticate(session, cancel, check).await? {
				return Ok(outcome);
			}

			// The session check navigates away, and the add control acts on the open page.
			let carted = pace::guard(cancel, async {
				self.driver.navigate(&self.params.target_url).await?;
				self.driver.add_to_cart().await
			})
			.await?;
			if let Err(e) = carted {
				match self.driver_failure(e, check, "add to cart") {
					Step::Skip => continue,
					Step::Stop(outcome) => return Ok(outcome),
				}
			}

			let items = match pace::guard(cancel, self.driver.cart_items()).await? {
				Ok(items) => items,
				Err(e) => match self.driver_failure(e, check, "read cart") {
					Step::Skip => continue,
					Step::Stop(outcome) => return Ok(outcome),
				},
			};

			let cart_score = MatchPolicy::best_score(items.iter().map(String::as_str), &target);
			if !self.matcher.is_match(cart_score) {
				warn!(
					target = "stockwatch.watch",
					check,
					items = ?items,
					expected = %target,
					similarity = cart_score,
					"IdentityMismatch: cart does not hold the target product"
				);
				self.status.report(
					WatchStatus::Monitoring,
					check,
					[("reason", json!("cart_mismatch")), ("cart_similarity", json!(cart_score))],
				);
				continue;
			}

			info!(target = "stockwatch.watch", check, similarity = cart_score, "target product verified in cart");
			self.status.report(
				WatchStatus::AddedToCart,
				check,
				[
					("product_name", json!(snapshot.name)),
					("similarity", json!(score)),
					("cart_similarity", json!(cart_score)),
				],
			);

			return Ok(WatchOutcome::Purchased(VerifiedAvailability {
				cycle: self.cycle,
				check,
				product_name: snapshot.name,
				similarity: score,
				cart_similarity: cart_score,
			}));
		}
	}

	/// Runs the session check; a recoverable failure ends the cycle with an
	/// error outcome instead of propagating.
	async fn authenticate(&self, session: &mut SessionManager, cancel: &CancellationToken, check: u64) -> Result<Option<WatchOutcome>, WatchError> {
		match session.ensure_authenticated(cancel).await {
			Ok(_) => Ok(None),
			Err(SessionError::Interrupted) => Err(WatchError::Interrupted),
			Err(e) if e.is_fatal() => Err(e.into()),
			Err(e) => {
				error!(target = "stockwatch.watch", error = %e, "could not authenticate");
				self.status.report(WatchStatus::Error, check, [("reason", json!(e.to_string()))]);
				Ok(Some(WatchOutcome::Error(e.to_string())))
			}
		}
	}

	async fn select_location(&self, cancel: &CancellationToken) -> Result<(), WatchError> {
		let label = self.params.location_label.trim();
		if label.is_empty() {
			return Ok(());
		}

		let selected = pace::guard(cancel, async {
			self.driver.navigate(&self.params.target_url).await?;
			self.driver.select_location(label).await
		})
		.await?;
		match selected {
			Ok(true) => info!(target = "stockwatch.watch", location = label, "delivery location selected"),
			Ok(false) => warn!(target = "stockwatch.watch", location = label, "saved location not found, using the site default"),
			Err(e) => warn!(target = "stockwatch.watch", location = label, error = %e, "could not select location"),
		}
		Ok(())
	}

	fn driver_failure(&self, err: DriverError, check: u64, action: &str) -> Step {
		if err.is_transient() {
			warn!(target = "stockwatch.watch", check, action, error = %err, "page check failed, retrying next interval");
			return Step::Skip;
		}
		error!(target = "stockwatch.watch", check, action, error = %err, "browser failure");
		self.status.report(WatchStatus::Error, check, [("reason", json!(err.to_string()))]);
		Step::Stop(WatchOutcome::Error(err.to_string()))
	}
}
