//! Retry knobs read by the request executor before every call.

// self
use crate::_prelude::*;

/// Whether transient failures are retried, and how many attempts a request may take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// When `false` every request gets exactly one attempt and no 401 recovery.
	pub enabled: bool,
	/// Upper bound on attempts per request (values below 1 are treated as 1).
	pub max_attempts: u32,
}
impl RetryPolicy {
	/// Default attempt budget.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

	/// Attempts the executor may make under this policy.
	pub fn effective_attempts(self) -> u32 {
		if self.enabled { self.max_attempts.max(1) } else { 1 }
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { enabled: true, max_attempts: Self::DEFAULT_MAX_ATTEMPTS }
	}
}

/// Exponential delay schedule between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
	/// Delay after the first failed attempt; doubled for every further attempt.
	pub initial: StdDuration,
	/// Ceiling applied to computed delays and server hints alike.
	pub max: StdDuration,
}
impl BackoffPolicy {
	/// Creates a schedule from its bounds.
	pub const fn new(initial: StdDuration, max: StdDuration) -> Self {
		Self { initial, max }
	}

	/// Delay to wait after `attempt` (1-based) failed; a `Retry-After` hint wins when present.
	pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> StdDuration {
		let delay = match retry_after {
			Some(hint) => StdDuration::try_from(hint).unwrap_or(StdDuration::ZERO),
			None => {
				let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));

				self.initial.checked_mul(factor).unwrap_or(self.max)
			},
		};

		delay.min(self.max)
	}
}
impl Default for BackoffPolicy {
	fn default() -> Self {
		Self::new(StdDuration::from_secs(1), StdDuration::from_secs(16))
	}
}
