//! Authenticated SimpliSafe API session with single-flight token rotation and retrying requests.
//!
//! A [`Session`](session::Session) is created from an authorization code (plus PKCE verifier)
//! or from a previously persisted refresh token. The vendor rotates the refresh token on every
//! exchange, so callers register a callback via
//! [`Session::add_refresh_token_callback`](session::Session::add_refresh_token_callback) and
//! persist the new value whenever it fires.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod resources;
pub mod session;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` feature.

	pub use crate::_prelude::*;

	// self
	use crate::{config::SessionConfig, http::ReqwestHttpClient};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a session config whose endpoints all live under `base` (typically a mock
	/// server URL) and whose backoff is short enough for tests.
	pub fn test_session_config(base: &str) -> SessionConfig {
		let base = base.trim_end_matches('/');

		SessionConfig::builder()
			.authorization_endpoint(
				Url::parse(&format!("{base}/authorize"))
					.expect("Mock authorize endpoint should parse successfully."),
			)
			.token_endpoint(
				Url::parse(&format!("{base}/oauth/token"))
					.expect("Mock token endpoint should parse successfully."),
			)
			.api_base(
				Url::parse(&format!("{base}/v1/")).expect("Mock API base should parse successfully."),
			)
			.backoff(crate::session::BackoffPolicy::new(
				StdDuration::from_millis(5),
				StdDuration::from_millis(20),
			))
			.build()
			.expect("Test session config should build successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
