//! Token endpoint client: authorization-code and refresh-token exchanges.
//!
//! [`Authenticator`] wraps an [`oauth2`] [`BasicClient`] configured as a public client (no
//! secret, PKCE for the code grant) and routes every call through the session's
//! [`ApiHttpClient`]. It never touches the credential store; committing the result is the
//! caller's job.

pub use oauth2;

// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, ClientId, EndpointNotSet, EndpointSet, HttpClientError,
	PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, Grant, GrantType},
	config::SessionConfig,
	error::{ClientError, ConfigError},
	http::{ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Label used in errors raised while talking to the token endpoint.
pub const TOKEN_ENDPOINT_TARGET: &str = "token endpoint";

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps HTTP transport failures into session [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted while calling `target` into a session error.
	fn map_transport_error(
		&self,
		target: &'static str,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		target: &'static str,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => {
				let inner = *inner;

				if inner.is_builder() {
					ConfigError::from(inner).into()
				} else if inner.is_timeout() {
					Error::Timeout { timeout: None }
				} else {
					ClientError::network(target, inner).into()
				}
			},
			other => map_common_transport_error(target, meta, other),
		}
	}
}

/// Mapper usable with any transport: every transport-specific failure becomes a
/// [`ClientError::Network`].
#[derive(Clone, Debug, Default)]
pub struct GenericTransportErrorMapper;
impl<E> TransportErrorMapper<E> for GenericTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(
		&self,
		target: &'static str,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<E>,
	) -> Error {
		map_common_transport_error(target, meta, err)
	}
}

/// Performs grant exchanges against the vendor's token endpoint.
pub struct Authenticator<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	timeout: StdDuration,
}
impl<C, M> Authenticator<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Builds an authenticator for the endpoints and client identity in `config`.
	pub fn from_config(
		config: &SessionConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(config.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(config.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let redirect_url = RedirectUrl::new(config.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			timeout: config.request_timeout,
		})
	}

	/// Transport shared with the request executor.
	pub fn http_client(&self) -> &Arc<C> {
		&self.http_client
	}

	/// Transport error mapper shared with the request executor.
	pub fn error_mapper(&self) -> &Arc<M> {
		&self.error_mapper
	}

	/// Exchanges `grant` for a new credential pair.
	///
	/// A 401 or 403 from the token endpoint, whatever the body looks like, and an
	/// `invalid_grant` OAuth error both surface as [`Error::InvalidCredentials`]. A response
	/// without `expires_in` or `refresh_token` is rejected because the session cannot outlive
	/// either.
	pub async fn exchange(&self, grant: &Grant) -> Result<Credentials> {
		let kind = match grant.kind() {
			GrantType::AuthorizationCode => FlowKind::AuthorizationCode,
			GrantType::RefreshToken => FlowKind::Refresh,
		};
		let span = FlowSpan::new(kind, "exchange");

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				match tokio::time::timeout(self.timeout, self.exchange_once(grant)).await {
					Ok(result) => result,
					Err(_) => Err(Error::Timeout { timeout: Some(self.timeout) }),
				}
			})
			.await;

		obs::record_flow_result(kind, &result);

		result
	}

	async fn exchange_once(&self, grant: &Grant) -> Result<Credentials> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = match grant {
			Grant::AuthorizationCode { code, code_verifier } =>
				self.oauth_client
					.exchange_code(AuthorizationCode::new(code.expose().to_owned()))
					.set_pkce_verifier(PkceCodeVerifier::new(code_verifier.expose().to_owned()))
					.request_async(&handle)
					.await,
			Grant::RefreshToken(token) => {
				let refresh = RefreshToken::new(token.expose().to_owned());

				self.oauth_client.exchange_refresh_token(&refresh).request_async(&handle).await
			},
		}
		.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;
		let expires_in = response.expires_in().ok_or(ClientError::MissingExpiresIn)?;
		let expires_in =
			Duration::try_from(expires_in).map_err(|_| ClientError::ExpiresInOutOfRange)?;
		let refresh_token = response.refresh_token().ok_or(ClientError::MissingRefreshToken)?;
		let credentials = Credentials::issued(
			response.access_token().secret().to_owned(),
			refresh_token.secret().to_owned(),
			expires_in,
			OffsetDateTime::now_utc(),
		)?;

		Ok(credentials)
	}
}
impl<C, M> Debug for Authenticator<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator")
			.field("client_id", self.oauth_client.client_id())
			.field("timeout", &self.timeout)
			.finish()
	}
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta.as_ref().and_then(|value| value.status);

	// The vendor answers bad credentials with bodies that are not always OAuth-shaped.
	if matches!(status, Some(401 | 403)) {
		return Error::InvalidCredentials { reason: rejection_reason(&err, status) };
	}

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(response, status),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(TOKEN_ENDPOINT_TARGET, meta.as_ref(), error),
		RequestTokenError::Parse(error, _body) => ClientError::MalformedBody {
			target: TOKEN_ENDPOINT_TARGET,
			status,
			source: Arc::new(error),
		}
		.into(),
		RequestTokenError::Other(message) => ClientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_server_response(response: BasicErrorResponse, status: Option<u16>) -> Error {
	let message = oauth_error_message(&response);

	match response.error() {
		BasicErrorResponseType::InvalidGrant => Error::InvalidCredentials { reason: message },
		_ => ClientError::TokenEndpoint { message, status }.into(),
	}
}

fn oauth_error_message(response: &BasicErrorResponse) -> String {
	match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	}
}

fn rejection_reason<E>(
	err: &BasicRequestTokenError<HttpClientError<E>>,
	status: Option<u16>,
) -> String
where
	E: 'static + Send + Sync + StdError,
{
	let reason = match err {
		RequestTokenError::ServerResponse(response) => oauth_error_message(response),
		RequestTokenError::Parse(_, body) =>
			String::from_utf8_lossy(body).trim().trim_matches('"').to_owned(),
		RequestTokenError::Other(message) => message.clone(),
		RequestTokenError::Request(_) => String::new(),
	};

	if reason.is_empty() {
		format!("token endpoint answered HTTP {}", status.unwrap_or_default())
	} else {
		reason
	}
}

fn map_common_transport_error<E>(
	target: &'static str,
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<E>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => ClientError::network(target, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => ClientError::Io { target, source: Arc::new(inner) }.into(),
		HttpClientError::Other(message) => ClientError::Unexpected { target, message }.into(),
		_ => ClientError::Unexpected {
			target,
			message: match meta.and_then(|value| value.status) {
				Some(status) => format!("unclassified failure after HTTP {status}"),
				None => "unclassified failure".into(),
			},
		}
		.into(),
	}
}
