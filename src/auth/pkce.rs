//! Authorization Code + PKCE helper producing the vendor login URL.
//!
//! Callers open [`AuthorizationRequest::authorize_url`] in a browser, capture the `code`
//! query parameter delivered to the redirect URI, and hand it, together with
//! [`AuthorizationRequest::code_verifier`], to
//! [`Session::from_authorization_code`](crate::session::Session::from_authorization_code).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret, config::SessionConfig};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Login handshake state: the URL to visit plus the secrets needed to redeem the code.
#[derive(Clone)]
pub struct AuthorizationRequest {
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Fully-formed authorize URL to send the end-user to.
	pub authorize_url: Url,
	code_verifier: TokenSecret,
	code_challenge: String,
}
impl AuthorizationRequest {
	/// Generates a fresh verifier, challenge, and state for `config`.
	pub fn new(config: &SessionConfig) -> Self {
		let state = random_string(STATE_LEN);
		let code_verifier = random_string(PKCE_VERIFIER_LEN);
		let code_challenge = compute_pkce_challenge(&code_verifier);
		let authorize_url = build_authorize_url(config, &state, &code_challenge);

		Self { state, authorize_url, code_verifier: TokenSecret::new(code_verifier), code_challenge }
	}

	/// PKCE verifier to present alongside the authorization code.
	pub fn code_verifier(&self) -> &str {
		self.code_verifier.expose()
	}

	/// PKCE challenge embedded in the authorize URL.
	pub fn code_challenge(&self) -> &str {
		&self.code_challenge
	}

	/// PKCE challenge method (always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		PkceCodeChallengeMethod::S256
	}

	/// Validates the `state` parameter returned with the authorization code.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidCredentials { reason: "Authorization state mismatch".into() })
		}
	}
}
impl Debug for AuthorizationRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationRequest")
			.field("state", &self.state)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.code_challenge)
			.field("code_verifier", &self.code_verifier)
			.finish()
	}
}

fn build_authorize_url(config: &SessionConfig, state: &str, code_challenge: &str) -> Url {
	let mut url = config.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &config.client_id);
	pairs.append_pair("redirect_uri", config.redirect_uri.as_str());

	if !config.scope.is_empty() {
		pairs.append_pair("scope", &config.scope);
	}
	if !config.audience.is_empty() {
		pairs.append_pair("audience", &config.audience);
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", code_challenge);
	pairs.append_pair("code_challenge_method", PkceCodeChallengeMethod::S256.as_str());

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn challenge_matches_rfc7636_example() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn authorize_url_carries_pkce_and_state() {
		let config = SessionConfig::default();
		let request = AuthorizationRequest::new(&config);
		let pairs: HashMap<_, _> = request.authorize_url.query_pairs().into_owned().collect();

		assert_eq!(request.state.len(), STATE_LEN);
		assert_eq!(request.code_verifier().len(), PKCE_VERIFIER_LEN);
		assert_eq!(pairs.get("response_type"), Some(&"code".into()));
		assert_eq!(pairs.get("client_id"), Some(&config.client_id));
		assert_eq!(pairs.get("redirect_uri"), Some(&config.redirect_uri.to_string()));
		assert_eq!(pairs.get("state"), Some(&request.state));
		assert_eq!(pairs.get("code_challenge"), Some(&request.code_challenge().to_owned()));
		assert_eq!(pairs.get("code_challenge_method"), Some(&"S256".into()));
		assert_eq!(request.code_challenge(), compute_pkce_challenge(request.code_verifier()));
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let request = AuthorizationRequest::new(&SessionConfig::default());
		let state = request.state.clone();

		assert!(request.validate_state(&state).is_ok());

		let err = request.validate_state("other").expect_err("State mismatch should fail.");

		assert!(err.is_invalid_credentials());
	}
}
