//! Validated session configuration: vendor endpoints, client identity, retry and timing knobs.
//!
//! [`SessionConfig::default`] targets the production vendor endpoints. Tests and proxies use
//! [`SessionConfig::builder`] to point the session elsewhere; the builder enforces HTTPS for
//! every endpoint except loopback hosts.

mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	session::{BackoffPolicy, RetryPolicy},
};

/// Production authorize endpoint.
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://auth.simplisafe.com/authorize";
/// Production token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://auth.simplisafe.com/oauth/token";
/// Production REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.simplisafe.com/v1/";
/// OAuth client identifier registered for the vendor's mobile app.
pub const DEFAULT_CLIENT_ID: &str = "42aBZ5lYrVW12jfOuu3CQROitwxg9sN5";
/// Redirect URI registered for [`DEFAULT_CLIENT_ID`].
pub const DEFAULT_REDIRECT_URI: &str =
	"com.simplisafe.mobile://auth.simplisafe.com/ios/com.simplisafe.mobile/callback";
/// Scopes requested on the authorize URL.
pub const DEFAULT_SCOPE: &str =
	"offline_access email openid https://api.simplisafe.com/scopes/user:platform";
/// Audience requested on the authorize URL.
pub const DEFAULT_AUDIENCE: &str = "https://api.simplisafe.com/";

/// Endpoint set the session talks to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Authorize endpoint used to build the login URL.
	pub authorization: Url,
	/// Token endpoint used for code and refresh-token exchanges.
	pub token: Url,
	/// Base URL that resource paths are joined onto; always ends with `/`.
	pub api_base: Url,
}

/// Immutable configuration shared by every component of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Vendor endpoints.
	pub endpoints: Endpoints,
	/// OAuth client identifier sent with every grant.
	pub client_id: String,
	/// Redirect URI registered for the client.
	pub redirect_uri: Url,
	/// Space-delimited scopes for the authorize URL.
	pub scope: String,
	/// Audience for the authorize URL.
	pub audience: String,
	/// User agent advertised by the default transport.
	pub user_agent: String,
	/// Initial retry policy; adjustable at runtime on the session.
	pub retry: RetryPolicy,
	/// Delay schedule between retried attempts.
	pub backoff: BackoffPolicy,
	/// Window before expiry in which the access token already counts as stale.
	pub refresh_margin: Duration,
	/// Upper bound for every individual HTTP call.
	pub request_timeout: StdDuration,
}
impl SessionConfig {
	/// Default refresh margin.
	pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::SECOND;
	/// Default per-call timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Creates a builder seeded with the production defaults.
	pub fn builder() -> SessionConfigBuilder {
		SessionConfigBuilder::new()
	}
}
impl Default for SessionConfig {
	fn default() -> Self {
		fn url(value: &str) -> Url {
			Url::parse(value)
				.unwrap_or_else(|e| unreachable!("built-in URL `{value}` is invalid: {e}"))
		}

		Self {
			endpoints: Endpoints {
				authorization: url(DEFAULT_AUTHORIZATION_ENDPOINT),
				token: url(DEFAULT_TOKEN_ENDPOINT),
				api_base: url(DEFAULT_API_BASE),
			},
			client_id: DEFAULT_CLIENT_ID.into(),
			redirect_uri: url(DEFAULT_REDIRECT_URI),
			scope: DEFAULT_SCOPE.into(),
			audience: DEFAULT_AUDIENCE.into(),
			user_agent: concat!("simplisafe-session/", env!("CARGO_PKG_VERSION")).into(),
			retry: RetryPolicy::default(),
			backoff: BackoffPolicy::default(),
			refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
			request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_target_production_endpoints() {
		let config = SessionConfig::default();

		assert_eq!(config.endpoints.token.as_str(), DEFAULT_TOKEN_ENDPOINT);
		assert_eq!(config.endpoints.api_base.as_str(), DEFAULT_API_BASE);
		assert_eq!(config.redirect_uri.scheme(), "com.simplisafe.mobile");
		assert_eq!(config.retry, RetryPolicy { enabled: true, max_attempts: 4 });
		assert_eq!(config.refresh_margin, Duration::SECOND);
		assert!(config.user_agent.starts_with("simplisafe-session/"));
	}
}
