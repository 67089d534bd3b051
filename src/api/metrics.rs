//! Dispatch counters shared by clones of a dispatcher.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing dispatcher activity.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
	requests: AtomicU64,
	refreshes: AtomicU64,
	retries: AtomicU64,
	invalidations: AtomicU64,
}
impl DispatchMetrics {
	/// Returns the number of logical requests sent.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns the number of forced refreshes triggered by `401` responses.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of redispatched requests.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of session invalidations signalled.
	pub fn invalidations(&self) -> u64 {
		self.invalidations.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}
}
