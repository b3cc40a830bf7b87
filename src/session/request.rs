//! Retrying executor for authenticated API calls.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		self, Method, StatusCode,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ClientError, ConfigError},
	http::{ApiHttpClient, ResponseMetadataSlot, parse_retry_after},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{Session, refresh::RefreshTrigger},
};

/// Label used in errors raised while talking to the REST API.
pub const API_TARGET: &str = "API";

const MESSAGE_PREVIEW_CHARS: usize = 200;

/// Authenticated call to a path under the configured API base.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the API base; a leading `/` is ignored.
	pub path: String,
	/// Query parameters appended in order.
	pub query: Vec<(String, String)>,
	/// Optional JSON body.
	pub body: Option<Value>,
}
impl ApiRequest {
	/// Creates a request with no query and no body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), body: None }
	}

	/// `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Sets a JSON body.
	pub fn json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body)
			.map_err(|e| ConfigError::InvalidBody { source: Arc::new(e) })?;

		self.body = Some(body);

		Ok(self)
	}

	fn url(&self, api_base: &Url) -> Result<Url> {
		let mut url = api_base
			.join(self.path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: self.path.clone(), source })?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&self.query);
		}

		Ok(url)
	}
}

/// Successful API response before decoding.
struct RawResponse {
	status: u16,
	body: Vec<u8>,
}

impl<C, M> Session<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Sends `request` with the current bearer token and returns the decoded JSON body
	/// (`Value::Null` for an empty body).
	///
	/// A 401 triggers one forced refresh followed by one resend, which does not consume an
	/// attempt. 409 and 5xx responses are retried with backoff while attempts remain. With
	/// retries disabled the first response is final.
	pub async fn request(&self, request: ApiRequest) -> Result<Value> {
		let raw = self.execute(&request).await?;

		if is_blank(&raw.body) {
			return Ok(Value::Null);
		}

		decode(raw.status, &raw.body)
	}

	/// Like [`Session::request`] but decodes the body into `T`, reporting the JSON path of
	/// any mismatch.
	pub async fn request_as<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let raw = self.execute(&request).await?;

		if is_blank(&raw.body) {
			return serde_path_to_error::deserialize(Value::Null).map_err(|e| {
				ClientError::MalformedBody {
					target: API_TARGET,
					status: Some(raw.status),
					source: Arc::new(e),
				}
				.into()
			});
		}

		decode(raw.status, &raw.body)
	}

	async fn execute(&self, request: &ApiRequest) -> Result<RawResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.execute_with_retries(request)).await;

		obs::record_flow_result(KIND, &result);

		result
	}

	async fn execute_with_retries(&self, request: &ApiRequest) -> Result<RawResponse> {
		let policy = self.retry_policy();
		let max_attempts = policy.effective_attempts();
		let url = request.url(&self.core.config.endpoints.api_base)?;
		let mut credentials = self.core.coordinator.ensure_fresh(RefreshTrigger::Expiry).await?;
		let mut attempt = 0;
		let mut reauthenticated = false;

		loop {
			attempt += 1;

			let response = self.send(request, &url, &credentials.access_token).await?;
			let status = response.status().as_u16();

			if response.status().is_success() {
				return Ok(RawResponse { status, body: response.into_body() });
			}

			let message = error_message(response.status(), response.body());

			match status {
				401 if policy.enabled && !reauthenticated => {
					reauthenticated = true;
					attempt -= 1;

					self.core.metrics.record_reauthentication();
					obs::reauthenticating(&request.path);

					credentials = self
						.core
						.coordinator
						.ensure_fresh(RefreshTrigger::Rejected(credentials.access_token.clone()))
						.await?;
				},
				401 | 403 => return Err(Error::InvalidCredentials { reason: message }),
				409 | 500..=599 if attempt < max_attempts => {
					let retry_after = parse_retry_after(response.headers());
					let delay = self.core.config.backoff.delay(attempt, retry_after);

					self.core.metrics.record_retry();
					obs::retry_scheduled(&request.path, attempt, status, delay);

					tokio::time::sleep(delay).await;

					credentials =
						self.core.coordinator.ensure_fresh(RefreshTrigger::Expiry).await?;
				},
				_ =>
					return Err(Error::Request {
						path: request.path.clone(),
						status,
						message,
						attempts: attempt,
					}),
			}
		}
	}

	async fn send(
		&self,
		request: &ApiRequest,
		url: &Url,
		access_token: &TokenSecret,
	) -> Result<HttpResponse> {
		let authenticator = &self.core.authenticator;
		let timeout = self.core.config.request_timeout;
		let meta = ResponseMetadataSlot::default();
		let handle = authenticator.http_client().with_metadata(meta.clone());
		let http_request = build_http_request(request, url, access_token)?;

		tokio::time::timeout(timeout, handle.call(http_request))
			.await
			.map_err(|_| Error::Timeout { timeout: Some(timeout) })?
			.map_err(|e| {
				authenticator.error_mapper().map_transport_error(API_TARGET, meta.take().as_ref(), e)
			})
	}
}

fn build_http_request(
	request: &ApiRequest,
	url: &Url,
	access_token: &TokenSecret,
) -> Result<HttpRequest> {
	let mut builder = http::Request::builder()
		.method(request.method.clone())
		.uri(url.as_str())
		.header(AUTHORIZATION, format!("Bearer {}", access_token.expose()))
		.header(ACCEPT, "application/json");
	let body = match &request.body {
		Some(body) => {
			builder = builder.header(CONTENT_TYPE, "application/json");

			serde_json::to_vec(body)
				.map_err(|e| ConfigError::InvalidBody { source: Arc::new(e) })?
		},
		None => Vec::new(),
	};

	builder.body(body).map_err(|e| ConfigError::from(e).into())
}

fn decode<T>(status: u16, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(body)).map_err(|e| {
		ClientError::MalformedBody { target: API_TARGET, status: Some(status), source: Arc::new(e) }
			.into()
	})
}

fn is_blank(body: &[u8]) -> bool {
	body.iter().all(u8::is_ascii_whitespace)
}

/// Reduces an error body to a message: JSON string literals are unquoted, objects yield their
/// `message`/`error_description`/`error` field, anything else is previewed as text.
fn error_message(status: StatusCode, body: &[u8]) -> String {
	let message = match serde_json::from_slice::<Value>(body) {
		Ok(Value::String(message)) => message,
		Ok(Value::Object(fields)) => ["message", "error_description", "error"]
			.iter()
			.find_map(|key| fields.get(*key).and_then(Value::as_str))
			.map(ToOwned::to_owned)
			.unwrap_or_else(|| preview(body)),
		_ => preview(body),
	};

	if message.is_empty() {
		status.canonical_reason().unwrap_or("Unknown status").to_owned()
	} else {
		message
	}
}

fn preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.chars().count() > MESSAGE_PREVIEW_CHARS {
		format!("{}...", text.chars().take(MESSAGE_PREVIEW_CHARS).collect::<String>())
	} else {
		text.to_owned()
	}
}
