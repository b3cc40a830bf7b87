// self
use crate::{
	_prelude::*,
	config::SessionConfig,
	session::{BackoffPolicy, RetryPolicy},
};

/// Errors raised while constructing or validating a [`SessionConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigBuildError {
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// API base cannot carry query strings or fragments.
	#[error("The API base must not carry a query or fragment: {url}.")]
	InvalidApiBase {
		/// Offending URL.
		url: String,
	},
	/// Client identifier is blank.
	#[error("Client identifier must not be empty.")]
	MissingClientId,
	/// Retry policy allows zero attempts.
	#[error("Retry policy must allow at least one attempt.")]
	ZeroAttempts,
	/// Backoff cap is below its initial delay.
	#[error("Backoff maximum must not be smaller than the initial delay.")]
	InvertedBackoff,
	/// Negative margins would refresh only after expiry.
	#[error("Refresh margin must not be negative.")]
	NegativeRefreshMargin,
	/// Zero timeouts fail every call.
	#[error("Request timeout must be positive.")]
	ZeroTimeout,
}

/// Builder for [`SessionConfig`] values.
#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
	config: SessionConfig,
}
impl SessionConfigBuilder {
	/// Creates a builder seeded with [`SessionConfig::default`].
	pub fn new() -> Self {
		Self { config: SessionConfig::default() }
	}

	/// Sets the authorize endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.config.endpoints.authorization = url;

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.config.endpoints.token = url;

		self
	}

	/// Sets the API base; a trailing `/` is appended when missing.
	pub fn api_base(mut self, url: Url) -> Self {
		self.config.endpoints.api_base = url;

		self
	}

	/// Overrides the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.config.client_id = client_id.into();

		self
	}

	/// Overrides the redirect URI.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.config.redirect_uri = url;

		self
	}

	/// Overrides the authorize scope string.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.config.scope = scope.into();

		self
	}

	/// Overrides the authorize audience.
	pub fn audience(mut self, audience: impl Into<String>) -> Self {
		self.config.audience = audience.into();

		self
	}

	/// Overrides the user agent of the default transport.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.config.user_agent = user_agent.into();

		self
	}

	/// Overrides the maximum number of attempts per request.
	pub fn max_attempts(mut self, max_attempts: u32) -> Self {
		self.config.retry.max_attempts = max_attempts;

		self
	}

	/// Overrides the whole initial retry policy.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.config.retry = retry;

		self
	}

	/// Overrides the backoff schedule.
	pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.config.backoff = backoff;

		self
	}

	/// Overrides the refresh margin.
	pub fn refresh_margin(mut self, margin: Duration) -> Self {
		self.config.refresh_margin = margin;

		self
	}

	/// Overrides the per-call timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.request_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<SessionConfig, ConfigBuildError> {
		let mut config = self.config;

		if !config.endpoints.api_base.path().ends_with('/') {
			let path = format!("{}/", config.endpoints.api_base.path());

			config.endpoints.api_base.set_path(&path);
		}

		config.validate()?;

		Ok(config)
	}
}
impl Default for SessionConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionConfig {
	/// Validates invariants for the config.
	fn validate(&self) -> Result<(), ConfigBuildError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("API", &self.endpoints.api_base)?;

		let api_base = &self.endpoints.api_base;

		if api_base.query().is_some() || api_base.fragment().is_some() {
			return Err(ConfigBuildError::InvalidApiBase { url: api_base.to_string() });
		}
		if self.client_id.trim().is_empty() {
			return Err(ConfigBuildError::MissingClientId);
		}
		if self.retry.max_attempts == 0 {
			return Err(ConfigBuildError::ZeroAttempts);
		}
		if self.backoff.max < self.backoff.initial {
			return Err(ConfigBuildError::InvertedBackoff);
		}
		if self.refresh_margin.is_negative() {
			return Err(ConfigBuildError::NegativeRefreshMargin);
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigBuildError::ZeroTimeout);
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigBuildError> {
	let loopback = match url.host() {
		Some(url::Host::Domain(domain)) => domain == "localhost",
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ConfigBuildError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}
