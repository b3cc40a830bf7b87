//! In-process credential store shared by the coordinator and the request executor.
//!
//! The store holds exactly one [`Credentials`] value. Rotations replace it as a whole under a
//! write lock, so readers see either the previous pair or the next one and never a mix.

// self
use crate::{
	_prelude::*,
	auth::{CredentialStatus, Credentials, TokenSecret},
};

#[derive(Debug)]
struct StoreState {
	credentials: Credentials,
	invalidated_at: Option<OffsetDateTime>,
}

/// Thread-safe holder for the session's current credentials.
#[derive(Debug)]
pub struct CredentialStore(RwLock<StoreState>);
impl CredentialStore {
	/// Seeds the store with the credentials produced by the bootstrap exchange.
	pub fn new(credentials: Credentials) -> Self {
		Self(RwLock::new(StoreState { credentials, invalidated_at: None }))
	}

	/// Returns a consistent copy of the current credentials.
	pub fn snapshot(&self) -> Credentials {
		self.0.read().credentials.clone()
	}

	/// Returns the current access token.
	pub fn access_token(&self) -> TokenSecret {
		self.0.read().credentials.access_token.clone()
	}

	/// Returns the current refresh token.
	pub fn refresh_token(&self) -> TokenSecret {
		self.0.read().credentials.refresh_token.clone()
	}

	/// Freshness of the stored credentials at `now`.
	pub fn status_at(&self, now: OffsetDateTime, margin: Duration) -> CredentialStatus {
		let state = self.0.read();

		if state.invalidated_at.is_some() {
			CredentialStatus::Invalid
		} else {
			state.credentials.status_at(now, margin)
		}
	}

	/// Instant at which the token endpoint rejected the refresh grant, if it did.
	pub fn invalidated_at(&self) -> Option<OffsetDateTime> {
		self.0.read().invalidated_at
	}

	/// Replaces the stored credentials with a freshly exchanged pair.
	///
	/// Rotations are only committed by the refresh coordinator, which serializes them.
	pub(crate) fn rotate(&self, credentials: Credentials) {
		let mut state = self.0.write();

		state.credentials = credentials;
		state.invalidated_at = None;
	}

	/// Flags the credentials as permanently rejected.
	pub(crate) fn invalidate(&self, instant: OffsetDateTime) {
		self.0.write().invalidated_at.get_or_insert(instant);
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn credentials(access: &str, refresh: &str, issued: OffsetDateTime) -> Credentials {
		Credentials::issued(access, refresh, Duration::hours(1), issued)
			.expect("Credentials fixture should build.")
	}

	#[test]
	fn rotate_replaces_the_pair_atomically() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let store = CredentialStore::new(credentials("access-1", "refresh-1", issued));
		let next = credentials("access-2", "refresh-2", issued + Duration::minutes(30));

		store.rotate(next.clone());

		let snapshot = store.snapshot();

		assert_eq!(snapshot, next);
		assert_eq!(store.access_token().expose(), "access-2");
		assert_eq!(store.refresh_token().expose(), "refresh-2");
	}

	#[test]
	fn status_reports_staleness_and_invalidation() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let store = CredentialStore::new(credentials("access", "refresh", issued));

		assert_eq!(
			store.status_at(macros::datetime!(2025-01-01 00:10 UTC), Duration::SECOND),
			CredentialStatus::Fresh
		);
		assert_eq!(
			store.status_at(macros::datetime!(2025-01-01 01:10 UTC), Duration::SECOND),
			CredentialStatus::Stale
		);

		let rejected_at = macros::datetime!(2025-01-01 00:20 UTC);

		store.invalidate(rejected_at);
		store.invalidate(rejected_at + Duration::minutes(5));

		assert_eq!(store.invalidated_at(), Some(rejected_at));
		assert_eq!(
			store.status_at(macros::datetime!(2025-01-01 00:10 UTC), Duration::SECOND),
			CredentialStatus::Invalid
		);
	}
}
