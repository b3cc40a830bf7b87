//! Grants presented to the token endpoint.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// OAuth 2.0 grant types the vendor's token endpoint accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant with a PKCE verifier.
	AuthorizationCode,
	/// Refresh Token grant; every use rotates the refresh token.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}

/// Credential presented to the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
	/// Authorization code returned to the redirect URI plus the PKCE verifier that produced
	/// the challenge.
	AuthorizationCode {
		/// Authorization code.
		code: TokenSecret,
		/// PKCE code verifier.
		code_verifier: TokenSecret,
	},
	/// Most recent refresh token.
	RefreshToken(TokenSecret),
}
impl Grant {
	/// Builds an authorization-code grant.
	pub fn authorization_code(code: impl Into<String>, code_verifier: impl Into<String>) -> Self {
		Self::AuthorizationCode {
			code: TokenSecret::new(code),
			code_verifier: TokenSecret::new(code_verifier),
		}
	}

	/// Builds a refresh-token grant.
	pub fn refresh_token(token: impl Into<String>) -> Self {
		Self::RefreshToken(TokenSecret::new(token))
	}

	/// Grant type label.
	pub fn kind(&self) -> GrantType {
		match self {
			Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
			Self::RefreshToken(_) => GrantType::RefreshToken,
		}
	}
}
impl Debug for Grant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Grant").field(&self.kind().as_str()).finish()
	}
}
