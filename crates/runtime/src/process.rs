//! Process and port lifecycle helpers for launched browsers.

use std::path::PathBuf;

use crate::error::{DriverError, Result};

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		if PathBuf::from("/proc").join(pid.to_string()).exists() {
			return true;
		}

		std::process::Command::new("kill")
			.arg("-0")
			.arg(pid.to_string())
			.status()
			.map(|status| status.success())
			.unwrap_or(pid == std::process::id())
	}

	#[cfg(not(unix))]
	{
		pid == std::process::id()
	}
}

/// Returns `true` when `port` can be bound on localhost.
pub fn port_available(port: u16) -> bool {
	std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Picks a debugging port, preferring `preferred` and then scanning upward.
pub fn pick_debug_port(preferred: u16) -> Result<u16> {
	(preferred..preferred.saturating_add(64))
		.find(|port| port_available(*port))
		.ok_or_else(|| DriverError::Launch(format!("No free debugging port in {}..{}", preferred, preferred.saturating_add(64))))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(unix)]
	#[test]
	fn current_process_is_alive() {
		assert!(pid_is_alive(std::process::id()));
	}

	#[cfg(unix)]
	#[test]
	fn pid_zero_is_never_alive() {
		assert!(!pid_is_alive(0));
	}

	#[test]
	fn bound_port_is_reported_unavailable() {
		let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		assert!(!port_available(port));
		drop(listener);
		assert!(port_available(port));
	}

	#[test]
	fn pick_debug_port_skips_bound_port() {
		let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		if port < u16::MAX - 64 {
			let picked = pick_debug_port(port).unwrap();
			assert_ne!(picked, port);
			assert!(picked > port);
		}
	}
}
