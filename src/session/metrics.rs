//! Per-session activity counters.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing what a session did on the wire.
#[derive(Debug, Default)]
pub struct SessionMetrics {
	exchanges: AtomicU64,
	rotations: AtomicU64,
	exchange_failures: AtomicU64,
	retries: AtomicU64,
	reauthentications: AtomicU64,
}
impl SessionMetrics {
	/// Returns the number of token endpoint exchanges started (any grant).
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes committed after the session was created.
	pub fn rotations(&self) -> u64 {
		self.rotations.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn exchange_failures(&self) -> u64 {
		self.exchange_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of request attempts repeated after a transient status.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of forced re-authentications triggered by a 401.
	pub fn reauthentications(&self) -> u64 {
		self.reauthentications.load(Ordering::Relaxed)
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rotation(&self) {
		self.rotations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange_failure(&self) {
		self.exchange_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reauthentication(&self) {
		self.reauthentications.fetch_add(1, Ordering::Relaxed);
	}
}
