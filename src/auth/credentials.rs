//! Credential record issued by the token endpoint and its freshness lifecycle.

// self
use crate::{_prelude::*, error::ClientError};

/// Token value wrapper whose formatters never print the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw token. Callers must keep it out of logs.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Freshness of the credentials held by a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Access token is usable.
	Fresh,
	/// Access token expired (or is inside the refresh margin) and must be rotated.
	Stale,
	/// The token endpoint rejected the refresh grant; the session cannot recover.
	Invalid,
}

/// Access/refresh token pair plus the instants that drive refresh decisions.
///
/// Values are replaced as a whole after every exchange, so readers never observe an access
/// token paired with a refresh token from a different rotation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Bearer token attached to API calls.
	pub access_token: TokenSecret,
	/// Single-use refresh token; the vendor rotates it on every exchange.
	pub refresh_token: TokenSecret,
	/// Instant after which the access token is no longer accepted.
	pub expires_at: OffsetDateTime,
	/// Instant of the exchange that produced these credentials.
	pub last_refreshed_at: OffsetDateTime,
}
impl Credentials {
	/// Builds credentials from an exchange performed at `now` that lasts `expires_in`.
	pub fn issued(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		expires_in: Duration,
		now: OffsetDateTime,
	) -> Result<Self, ClientError> {
		if !expires_in.is_positive() {
			return Err(ClientError::NonPositiveExpiresIn);
		}

		let expires_at = now.checked_add(expires_in).ok_or(ClientError::ExpiresInOutOfRange)?;

		Ok(Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			expires_at,
			last_refreshed_at: now,
		})
	}

	/// Freshness at `instant`, treating anything within `margin` of the expiry as stale.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> CredentialStatus {
		if instant + margin >= self.expires_at {
			CredentialStatus::Stale
		} else {
			CredentialStatus::Fresh
		}
	}

	/// Returns `true` if the access token is stale at `instant`.
	pub fn is_stale_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		matches!(self.status_at(instant, margin), CredentialStatus::Stale)
	}

	/// Lifetime granted by the exchange.
	pub fn lifetime(&self) -> Duration {
		self.expires_at - self.last_refreshed_at
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("expires_at", &self.expires_at)
			.field("last_refreshed_at", &self.last_refreshed_at)
			.finish()
	}
}
