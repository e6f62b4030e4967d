//! Status artifact updates at meaningful transitions.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use stockwatch_protocol::{StatusRecord, WatchStatus};

use crate::store::StatusFile;

/// Builds timestamped [`StatusRecord`]s for one product and writes them.
#[derive(Debug, Clone)]
pub struct StatusReporter {
	file: StatusFile,
	product_url: String,
}

impl StatusReporter {
	pub fn new(file: StatusFile, product_url: impl Into<String>) -> Self {
		Self {
			file,
			product_url: product_url.into(),
		}
	}

	pub fn file(&self) -> &StatusFile {
		&self.file
	}

	pub fn report<I>(&self, status: WatchStatus, query_count: u64, details: I)
	where
		I: IntoIterator<Item = (&'static str, Value)>,
	{
		let mut record = StatusRecord::new(status, query_count, now_iso8601()).with_product_url(&self.product_url);
		for (key, value) in details {
			record = record.with_detail(key, value);
		}
		self.file.write(&record);
	}
}

pub fn now_iso8601() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
