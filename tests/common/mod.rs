//! Scripted in-process vendor used by the sequencing and concurrency tests.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	future::Future,
	io,
	pin::Pin,
	sync::{Arc, Mutex},
	time::Duration,
};
// crates.io
use serde_json::{Value, json};
// self
use simplisafe_session::{
	_preludet::test_session_config,
	config::SessionConfig,
	http::{ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{
		GenericTransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{StatusCode, header::CONTENT_TYPE},
		},
	},
	session::{Session, SessionFactory},
	url::form_urlencoded,
};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const AUTH_CHECK_PATH: &str = "/v1/api/authCheck";
pub const USER_ID: u64 = 12345;

pub type FakeSession = Session<FakeVendor, GenericTransportErrorMapper>;

/// One request observed by the fake vendor.
#[derive(Clone, Debug)]
pub struct Exchange {
	pub method: String,
	pub path: String,
	pub authorization: Option<String>,
	pub form: HashMap<String, String>,
}

/// Scripted answer.
pub enum Reply {
	Json(u16, Value),
	Text(u16, &'static str),
	Fail(io::ErrorKind),
}

type Handler = dyn Fn(&Exchange, usize) -> Reply + Send + Sync;

struct Inner {
	handler: Box<Handler>,
	log: Mutex<Vec<Exchange>>,
	token_delay: Duration,
}

/// Transport that answers from a closure instead of the network.
///
/// The closure receives the request and how many times its path has been hit, this call
/// included.
#[derive(Clone)]
pub struct FakeVendor(Arc<Inner>);
impl FakeVendor {
	pub fn new(handler: impl Fn(&Exchange, usize) -> Reply + Send + Sync + 'static) -> Self {
		Self::with_token_delay(Duration::ZERO, handler)
	}

	pub fn with_token_delay(
		token_delay: Duration,
		handler: impl Fn(&Exchange, usize) -> Reply + Send + Sync + 'static,
	) -> Self {
		Self(Arc::new(Inner {
			handler: Box::new(handler),
			log: Mutex::new(Vec::new()),
			token_delay,
		}))
	}

	pub fn calls(&self, path: &str) -> usize {
		self.exchanges(path).len()
	}

	pub fn exchanges(&self, path: &str) -> Vec<Exchange> {
		self.0
			.log
			.lock()
			.expect("Fake vendor log should not be poisoned.")
			.iter()
			.filter(|e| e.path == path)
			.cloned()
			.collect()
	}
}
impl ApiHttpClient for FakeVendor {
	type Handle = FakeHandle;
	type TransportError = io::Error;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHandle { inner: Arc::clone(&self.0), slot }
	}
}

pub struct FakeHandle {
	inner: Arc<Inner>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for FakeHandle {
	type Error = HttpClientError<io::Error>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let exchange = Exchange {
				method: request.method().to_string(),
				path: request.uri().path().to_owned(),
				authorization: request
					.headers()
					.get("authorization")
					.and_then(|value| value.to_str().ok())
					.map(ToOwned::to_owned),
				form: form_urlencoded::parse(request.body()).into_owned().collect(),
			};
			let nth = {
				let mut log =
					self.inner.log.lock().expect("Fake vendor log should not be poisoned.");

				log.push(exchange.clone());
				log.iter().filter(|e| e.path == exchange.path).count()
			};

			if exchange.path == TOKEN_PATH && !self.inner.token_delay.is_zero() {
				tokio::time::sleep(self.inner.token_delay).await;
			}

			let (status, content_type, body) = match (self.inner.handler)(&exchange, nth) {
				Reply::Json(status, value) => (
					status,
					"application/json",
					serde_json::to_vec(&value).expect("Reply JSON should serialize."),
				),
				Reply::Text(status, text) => (status, "text/plain", text.as_bytes().to_vec()),
				Reply::Fail(kind) => {
					let error = io::Error::new(kind, "scripted failure");

					return Err(HttpClientError::Reqwest(Box::new(error)));
				},
			};
			let status = StatusCode::from_u16(status).expect("Scripted status should be valid.");
			let mut response = HttpResponse::new(body);

			*response.status_mut() = status;
			response
				.headers_mut()
				.insert(CONTENT_TYPE, content_type.parse().expect("Content type should parse."));
			self.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after: None });

			Ok(response)
		})
	}
}

/// Token endpoint payload.
pub fn token_reply(access: &str, refresh: &str, expires_in: u64) -> Reply {
	Reply::Json(
		200,
		json!({
			"access_token": access,
			"refresh_token": refresh,
			"expires_in": expires_in,
			"token_type": "Bearer",
		}),
	)
}

/// `api/authCheck` payload.
pub fn auth_check_reply() -> Reply {
	Reply::Json(200, json!({ "userId": USER_ID, "isAdmin": false }))
}

/// Token reply numbered by call: the first exchange lives `first_expires_in` seconds, later
/// ones an hour.
pub fn numbered_token_reply(nth: usize, first_expires_in: u64) -> Reply {
	let expires_in = if nth == 1 { first_expires_in } else { 3600 };

	token_reply(&format!("access-{nth}"), &format!("refresh-{nth}"), expires_in)
}

pub fn config() -> SessionConfig {
	test_session_config("http://127.0.0.1:9")
}

pub async fn session(vendor: &FakeVendor) -> FakeSession {
	session_with_config(vendor, config()).await
}

pub async fn session_with_config(vendor: &FakeVendor, config: SessionConfig) -> FakeSession {
	SessionFactory::with_http_client(config, vendor.clone(), GenericTransportErrorMapper)
		.expect("Session factory should build.")
		.session_from_refresh_token("refresh-0")
		.await
		.expect("Session should bootstrap from a refresh token.")
}

/// Waits until a token issued with `expires_in = 2` is inside the default one-second margin.
pub async fn wait_until_stale() {
	tokio::time::sleep(Duration::from_millis(1200)).await;
}
