//! Single-flight refresh coordination.
//!
//! The coordinator owns the only path that rotates credentials. The first task that finds the
//! credentials stale spawns a refresh-token exchange onto the runtime and parks its join
//! handle, as a [`Shared`] future, in the in-flight slot; every other task that arrives before
//! it completes awaits the same future. The spawned task commits the result, clears the slot
//! and fires the callbacks on its own, so the rotation completes even when every waiter is
//! dropped.

// std
use std::sync::Weak;
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;
// self
use crate::{
	_prelude::*,
	auth::{CredentialStatus, Credentials, Grant, TokenSecret},
	error::ClientError,
	http::ApiHttpClient,
	oauth::{Authenticator, TOKEN_ENDPOINT_TARGET, TransportErrorMapper},
	obs,
	session::{CallbackRegistry, SessionMetrics},
	store::CredentialStore,
};

type RotationFuture = Shared<BoxFuture<'static, Result<Credentials>>>;

/// Reason a caller asks for fresh credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RefreshTrigger {
	/// Refresh only if the stored access token is stale.
	Expiry,
	/// The API rejected this access token; refresh unless it was already rotated away.
	Rejected(TokenSecret),
}

struct InFlight {
	generation: u64,
	future: RotationFuture,
}

#[derive(Default)]
struct Slot {
	next_generation: u64,
	current: Option<InFlight>,
}

pub(crate) struct RefreshCoordinator<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	authenticator: Arc<Authenticator<C, M>>,
	store: Arc<CredentialStore>,
	callbacks: CallbackRegistry,
	metrics: Arc<SessionMetrics>,
	margin: Duration,
	slot: Arc<Mutex<Slot>>,
}
impl<C, M> RefreshCoordinator<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		authenticator: Arc<Authenticator<C, M>>,
		store: Arc<CredentialStore>,
		callbacks: CallbackRegistry,
		metrics: Arc<SessionMetrics>,
		margin: Duration,
	) -> Self {
		Self { authenticator, store, callbacks, metrics, margin, slot: Default::default() }
	}

	/// Returns credentials that satisfy `trigger`, rotating them at most once across all
	/// concurrent callers.
	pub(crate) async fn ensure_fresh(&self, trigger: RefreshTrigger) -> Result<Credentials> {
		if !self.needs_refresh(&trigger)? {
			return Ok(self.store.snapshot());
		}

		let future = {
			let mut slot = self.slot.lock();
			let pending = slot.current.as_ref().map(|in_flight| in_flight.future.clone());

			match pending {
				Some(future) => future,
				None => {
					// Re-checked under the slot lock: a rotation may have landed since.
					if !self.needs_refresh(&trigger)? {
						return Ok(self.store.snapshot());
					}

					let generation = slot.next_generation;
					let future = self.rotation(generation);

					slot.next_generation += 1;
					slot.current = Some(InFlight { generation, future: future.clone() });

					future
				},
			}
		};

		future.await
	}

	fn needs_refresh(&self, trigger: &RefreshTrigger) -> Result<bool> {
		match self.store.status_at(OffsetDateTime::now_utc(), self.margin) {
			CredentialStatus::Invalid => Err(Error::InvalidCredentials {
				reason: "The refresh token was rejected; authenticate again".into(),
			}),
			status => Ok(match trigger {
				RefreshTrigger::Expiry => status == CredentialStatus::Stale,
				RefreshTrigger::Rejected(rejected) => self.store.access_token() == *rejected,
			}),
		}
	}

	fn rotation(&self, generation: u64) -> RotationFuture {
		let authenticator = Arc::clone(&self.authenticator);
		let store = Arc::clone(&self.store);
		let callbacks = self.callbacks.clone();
		let metrics = Arc::clone(&self.metrics);
		let slot = Arc::downgrade(&self.slot);
		let task = tokio::spawn({
			let slot = slot.clone();

			async move {
				let grant = Grant::RefreshToken(store.refresh_token());

				metrics.record_exchange();

				let result = authenticator.exchange(&grant).await;

				match &result {
					Ok(credentials) => {
						store.rotate(credentials.clone());
						metrics.record_rotation();
					},
					Err(e) => {
						if e.is_invalid_credentials() {
							store.invalidate(OffsetDateTime::now_utc());
						}

						metrics.record_exchange_failure();
					},
				}

				release(&slot, generation);

				if let Ok(credentials) = &result {
					let notified = callbacks.notify(credentials.refresh_token.expose());

					obs::tokens_rotated(credentials.expires_at, notified);
				}

				result
			}
		});

		async move {
			match task.await {
				Ok(result) => result,
				Err(e) => {
					// The task died before it could clear the slot itself.
					release(&slot, generation);

					Err(aborted(e))
				},
			}
		}
		.boxed()
		.shared()
	}
}

fn release(slot: &Weak<Mutex<Slot>>, generation: u64) {
	if let Some(slot) = slot.upgrade() {
		let mut slot = slot.lock();

		if slot.current.as_ref().is_some_and(|in_flight| in_flight.generation == generation) {
			slot.current = None;
		}
	}
}

fn aborted(error: JoinError) -> Error {
	let message = if error.is_panic() {
		"refresh task panicked".to_owned()
	} else {
		"refresh task was cancelled".to_owned()
	};

	ClientError::Unexpected { target: TOKEN_ENDPOINT_TARGET, message }.into()
}
