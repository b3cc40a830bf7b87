//! Authenticated session: credentials, refresh coordination, callbacks, and the retrying
//! request executor behind one cheaply cloneable handle.
//!
//! A [`Session`] is only ever created by exchanging a grant, either through
//! [`SessionFactory`] (any [`ApiHttpClient`]) or through the reqwest-backed shortcuts
//! [`Session::from_authorization_code`] and [`Session::from_refresh_token`]. Every clone shares
//! the same credentials, callbacks, and in-flight refresh, so concurrent tasks never race each
//! other into duplicate exchanges.

pub mod callbacks;
pub mod metrics;
pub mod request;
pub mod retry;

mod refresh;

pub use callbacks::*;
pub use metrics::*;
pub use request::*;
pub use retry::*;

// self
use crate::{
	_prelude::*,
	auth::{CredentialStatus, Credentials, Grant},
	config::SessionConfig,
	http::ApiHttpClient,
	oauth::{Authenticator, TransportErrorMapper},
	session::refresh::RefreshCoordinator,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Session specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestSession = Session<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Creates sessions that share one transport and one token endpoint client.
pub struct SessionFactory<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	config: SessionConfig,
	authenticator: Arc<Authenticator<C, M>>,
}
impl<C, M> SessionFactory<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Creates a factory that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: SessionConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let authenticator = Authenticator::from_config(&config, http_client, mapper)?;

		Ok(Self { config, authenticator: Arc::new(authenticator) })
	}

	/// Configuration every created session uses.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Redeems an authorization code (plus the PKCE verifier that produced its challenge).
	pub async fn session_from_authorization_code(
		&self,
		code: impl Into<String>,
		code_verifier: impl Into<String>,
	) -> Result<Session<C, M>> {
		self.start(Grant::authorization_code(code, code_verifier)).await
	}

	/// Resumes from a refresh token persisted by an earlier session.
	///
	/// The token is spent by this call; persist [`Session::refresh_token`] afterwards.
	pub async fn session_from_refresh_token(
		&self,
		refresh_token: impl Into<String>,
	) -> Result<Session<C, M>> {
		self.start(Grant::refresh_token(refresh_token)).await
	}

	async fn start(&self, grant: Grant) -> Result<Session<C, M>> {
		let metrics = Arc::new(SessionMetrics::default());

		metrics.record_exchange();

		let credentials = self.authenticator.exchange(&grant).await.inspect_err(|_| {
			metrics.record_exchange_failure();
		})?;
		let session = Session::assemble(
			self.config.clone(),
			Arc::clone(&self.authenticator),
			credentials,
			metrics,
		);
		let auth_check = session.auth_check().await?;

		*session.core.user_id.write() = Some(auth_check.user_id);

		Ok(session)
	}
}
#[cfg(feature = "reqwest")]
impl SessionFactory<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a factory with a reqwest transport advertising `config.user_agent`.
	pub fn new(config: SessionConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_user_agent(&config.user_agent)?;

		Self::with_http_client(config, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for SessionFactory<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionFactory")
			.field("config", &self.config)
			.field("authenticator", &self.authenticator)
			.finish()
	}
}

struct SessionCore<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	config: SessionConfig,
	authenticator: Arc<Authenticator<C, M>>,
	store: Arc<CredentialStore>,
	coordinator: RefreshCoordinator<C, M>,
	callbacks: CallbackRegistry,
	metrics: Arc<SessionMetrics>,
	retry: RwLock<RetryPolicy>,
	user_id: RwLock<Option<u64>>,
}

/// Authenticated API session.
pub struct Session<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	core: Arc<SessionCore<C, M>>,
}
impl<C, M> Session<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn assemble(
		config: SessionConfig,
		authenticator: Arc<Authenticator<C, M>>,
		credentials: Credentials,
		metrics: Arc<SessionMetrics>,
	) -> Self {
		let store = Arc::new(CredentialStore::new(credentials));
		let callbacks = CallbackRegistry::default();
		let coordinator = RefreshCoordinator::new(
			Arc::clone(&authenticator),
			Arc::clone(&store),
			callbacks.clone(),
			Arc::clone(&metrics),
			config.refresh_margin,
		);
		let retry = RwLock::new(config.retry);

		Self {
			core: Arc::new(SessionCore {
				config,
				authenticator,
				store,
				coordinator,
				callbacks,
				metrics,
				retry,
				user_id: RwLock::new(None),
			}),
		}
	}

	/// Current access token.
	pub fn access_token(&self) -> String {
		self.core.store.access_token().expose().to_owned()
	}

	/// Current refresh token; persist it, the previous one no longer works.
	pub fn refresh_token(&self) -> String {
		self.core.store.refresh_token().expose().to_owned()
	}

	/// Consistent copy of the current credential pair.
	pub fn credentials(&self) -> Credentials {
		self.core.store.snapshot()
	}

	/// Freshness of the current credentials.
	pub fn status(&self) -> CredentialStatus {
		self.core.store.status_at(OffsetDateTime::now_utc(), self.core.config.refresh_margin)
	}

	/// Vendor user id reported by the auth check performed at creation.
	pub fn user_id(&self) -> Option<u64> {
		*self.core.user_id.read()
	}

	/// Configuration the session was built with.
	pub fn config(&self) -> &SessionConfig {
		&self.core.config
	}

	/// Registers `callback` to receive every newly rotated refresh token.
	///
	/// Callbacks run in registration order after the new credentials are stored. A panicking
	/// callback is logged and does not affect the others or the request that triggered the
	/// rotation.
	pub fn add_refresh_token_callback<F>(&self, callback: F) -> CallbackHandle
	where
		F: 'static + Fn(&str) + Send + Sync,
	{
		self.core.callbacks.register(callback)
	}

	/// Re-enables retries and 401 recovery.
	pub fn enable_request_retries(&self) {
		self.core.retry.write().enabled = true;
	}

	/// Makes every request single-shot: no retries, no 401 recovery.
	pub fn disable_request_retries(&self) {
		self.core.retry.write().enabled = false;
	}

	/// Overrides the attempt budget for subsequent requests (values below 1 act as 1).
	pub fn set_max_attempts(&self, max_attempts: u32) {
		self.core.retry.write().max_attempts = max_attempts;
	}

	/// Retry policy applied to the next request.
	pub fn retry_policy(&self) -> RetryPolicy {
		*self.core.retry.read()
	}

	/// Counters describing the session's token and request activity.
	pub fn metrics(&self) -> &SessionMetrics {
		&self.core.metrics
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Redeems an authorization code over a fresh reqwest transport.
	pub async fn from_authorization_code(
		config: SessionConfig,
		code: impl Into<String>,
		code_verifier: impl Into<String>,
	) -> Result<Self> {
		SessionFactory::new(config)?.session_from_authorization_code(code, code_verifier).await
	}

	/// Resumes from a persisted refresh token over a fresh reqwest transport.
	pub async fn from_refresh_token(
		config: SessionConfig,
		refresh_token: impl Into<String>,
	) -> Result<Self> {
		SessionFactory::new(config)?.session_from_refresh_token(refresh_token).await
	}
}
impl<C, M> Clone for Session<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { core: Arc::clone(&self.core) }
	}
}
impl<C, M> Debug for Session<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("credentials", &self.core.store.snapshot())
			.field("user_id", &self.user_id())
			.field("retry", &self.retry_policy())
			.field("callbacks", &self.core.callbacks)
			.finish()
	}
}
