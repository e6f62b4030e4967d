//! Flat-file persistence: the cookie store and the status artifact.
//!
//! Both files are rewritten whole through a sibling temp file and a rename,
//! so a reader never observes a partial document.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use stockwatch_protocol::{Cookie, StatusRecord};
use tracing::{debug, warn};

use crate::error::StoreError;

pub const COOKIE_FILE: &str = "cookies.json";
pub const STATUS_FILE: &str = "status.json";

/// Serializes `value` as pretty JSON and replaces `path` atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|source| StoreError::Io {
			path: parent.to_path_buf(),
			source,
		})?;
	}

	let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
		path: path.to_path_buf(),
		source,
	})?;

	let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
	let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
	fs::write(&tmp_path, json).map_err(|source| StoreError::Io {
		path: tmp_path.clone(),
		source,
	})?;
	fs::rename(&tmp_path, path).map_err(|source| {
		let _ = fs::remove_file(&tmp_path);
		StoreError::Io {
			path: path.to_path_buf(),
			source,
		}
	})
}

/// Session cookies on disk. Written only by the session manager.
#[derive(Debug, Clone)]
pub struct CookieStore {
	path: PathBuf,
}

impl CookieStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn in_dir(state_dir: &Path) -> Self {
		Self::new(state_dir.join(COOKIE_FILE))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Loads the stored cookie set. A missing file is an empty set.
	pub fn load(&self) -> Result<Vec<Cookie>, StoreError> {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(source) => {
				return Err(StoreError::Io {
					path: self.path.clone(),
					source,
				});
			}
		};
		if content.trim().is_empty() {
			return Ok(Vec::new());
		}
		serde_json::from_str(&content).map_err(|source| StoreError::Json {
			path: self.path.clone(),
			source,
		})
	}

	/// Replaces the whole stored set.
	pub fn save(&self, cookies: &[Cookie]) -> Result<(), StoreError> {
		write_json_atomic(&self.path, cookies)?;
		debug!(target = "stockwatch.session", path = %self.path.display(), count = cookies.len(), "cookie store written");
		Ok(())
	}
}

/// The last-known-status document.
#[derive(Debug, Clone)]
pub struct StatusFile {
	path: PathBuf,
}

impl StatusFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn in_dir(state_dir: &Path) -> Self {
		Self::new(state_dir.join(STATUS_FILE))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Writes `record`; failures are logged and swallowed so the watch continues.
	pub fn write(&self, record: &StatusRecord) {
		match write_json_atomic(&self.path, record) {
			Ok(()) => debug!(target = "stockwatch.watch", status = %record.status, query_count = record.query_count, "status updated"),
			Err(e) => warn!(target = "stockwatch.watch", error = %e, "failed to write status file"),
		}
	}

	pub fn read(&self) -> Result<Option<StatusRecord>, StoreError> {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(source) => {
				return Err(StoreError::Io {
					path: self.path.clone(),
					source,
				});
			}
		};
		serde_json::from_str(&content).map(Some).map_err(|source| StoreError::Json {
			path: self.path.clone(),
			source,
		})
	}
}
