//! Session-level error types shared across the authenticator, coordinator, and executor.
//!
//! Every variant is cheap to clone: underlying causes are kept behind [`Arc`] so the outcome of
//! a single-flight token exchange can be handed to every task awaiting it.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared, type-erased error cause.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Unexpected or unclassified failure (transport, malformed payloads).
	#[error(transparent)]
	Client(#[from] ClientError),

	/// The vendor rejected the grant or the re-authentication failed; the session is unusable.
	#[error("Invalid credentials: {reason}.")]
	InvalidCredentials {
		/// Vendor- or session-supplied reason string.
		reason: String,
	},
	/// The API kept failing after the configured attempts or returned an unrecoverable status.
	#[error("Request to `{path}` failed with HTTP {status} after {attempts} attempt(s): {message}.")]
	Request {
		/// API path that was requested.
		path: String,
		/// Last HTTP status observed.
		status: u16,
		/// Message extracted from the last response body.
		message: String,
		/// Number of attempts that were made.
		attempts: u32,
	},
	/// A single HTTP call exceeded its timeout.
	#[error("HTTP call timed out.")]
	Timeout {
		/// Timeout that elapsed, when known.
		timeout: Option<StdDuration>,
	},
}
impl Error {
	/// Returns `true` when the error leaves the session unusable.
	pub fn is_invalid_credentials(&self) -> bool {
		matches!(self, Self::InvalidCredentials { .. })
	}

	/// Returns the HTTP status associated with the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Request { status, .. } => Some(*status),
			Self::Client(client) => client.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised locally.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<oauth2::http::Error>,
	},
	/// Configured endpoint cannot be parsed by the OAuth client.
	#[error("Configured endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path cannot be joined onto the API base.
	#[error("Request path `{path}` is invalid.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	InvalidBody {
		/// Underlying serialization failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// Session configuration failed validation.
	#[error(transparent)]
	Build(#[from] crate::config::ConfigBuildError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Generic client failures wrapping the underlying cause.
#[derive(Clone, Debug, ThisError)]
pub enum ClientError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {target}.")]
	Network {
		/// Endpoint label (token endpoint or API).
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the {target}.")]
	Io {
		/// Endpoint label (token endpoint or API).
		target: &'static str,
		/// Underlying IO failure.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// Response body could not be parsed as JSON of the expected shape.
	#[error("The {target} returned a malformed body.")]
	MalformedBody {
		/// Endpoint label (token endpoint or API).
		target: &'static str,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// Token endpoint returned an unexpected, non-credential failure.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint response omitted the rotated refresh token.
	#[error("Token endpoint response is missing refresh_token.")]
	MissingRefreshToken,
	/// Transport failed in a way it could not describe.
	#[error("HTTP client error occurred while calling the {target}: {message}.")]
	Unexpected {
		/// Endpoint label (token endpoint or API).
		target: &'static str,
		/// Transport-supplied description.
		message: String,
	},
}
impl ClientError {
	/// Wraps a transport-specific network error.
	pub fn network(target: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target, source: Arc::new(src) }
	}

	/// Returns the HTTP status associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::MalformedBody { status, .. } | Self::TokenEndpoint { status, .. } => *status,
			_ => None,
		}
	}
}
