#![cfg(feature = "reqwest")]

mod common;

// std
use std::io;
// crates.io
use serde::Deserialize;
use serde_json::{Value, json};
// self
use common::*;
use simplisafe_session::{
	error::{ClientError, Error},
	session::ApiRequest,
};

const SETTINGS_PATH: &str = "/v1/ss3/subscriptions/1/settings/normal";

fn vendor_with_api(
	api: impl Fn(&Exchange, usize) -> Reply + Send + Sync + 'static,
) -> FakeVendor {
	FakeVendor::new(move |exchange, nth| match exchange.path.as_str() {
		TOKEN_PATH => numbered_token_reply(nth, 3600),
		AUTH_CHECK_PATH => auth_check_reply(),
		_ => api(exchange, nth),
	})
}

fn settings() -> ApiRequest {
	ApiRequest::get("ss3/subscriptions/1/settings/normal").query("forceUpdate", false)
}

#[tokio::test]
async fn conflict_without_retries_fails_immediately() {
	let vendor = vendor_with_api(|_, _| Reply::Text(409, "Conflict"));
	let session = session(&vendor).await;

	session.disable_request_retries();

	let err = session.request(settings()).await.expect_err("409 should surface without retries.");

	match err {
		Error::Request { status, attempts, message, .. } => {
			assert_eq!(status, 409);
			assert_eq!(attempts, 1);
			assert_eq!(message, "Conflict");
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert_eq!(vendor.calls(SETTINGS_PATH), 1);
}

#[tokio::test]
async fn transient_statuses_are_retried_until_success() {
	let vendor = vendor_with_api(|_, nth| match nth {
		1 => Reply::Text(409, "Conflict"),
		2 => Reply::Json(503, json!({ "message": "Maintenance" })),
		_ => Reply::Json(200, json!({ "settings": { "normal": { "wifiSSID": "home" } } })),
	});
	let session = session(&vendor).await;

	session.set_max_attempts(3);

	let payload = session.request(settings()).await.expect("Third attempt should succeed.");

	assert_eq!(payload["settings"]["normal"]["wifiSSID"], "home");
	assert_eq!(vendor.calls(SETTINGS_PATH), 3);
	assert_eq!(session.metrics().retries(), 2);
	assert!(
		vendor.exchanges(SETTINGS_PATH)[0].form.is_empty(),
		"GET requests should not carry a body."
	);
}

#[tokio::test]
async fn two_conflicts_then_success_fit_three_attempts() {
	let vendor = vendor_with_api(|_, nth| match nth {
		1 | 2 => Reply::Text(409, "Conflict"),
		_ => Reply::Json(200, json!({ "ok": true })),
	});
	let session = session(&vendor).await;

	session.set_max_attempts(3);

	let payload = session.request(settings()).await.expect("Third attempt should succeed.");

	assert_eq!(payload, json!({ "ok": true }));
	assert_eq!(vendor.calls(SETTINGS_PATH), 3);
	assert_eq!(session.metrics().retries(), 2);
}

#[tokio::test]
async fn two_conflicts_exhaust_two_attempts() {
	let vendor = vendor_with_api(|_, nth| match nth {
		1 | 2 => Reply::Text(409, "Conflict"),
		_ => Reply::Json(200, json!({ "ok": true })),
	});
	let session = session(&vendor).await;

	session.set_max_attempts(2);

	let err = session.request(settings()).await.expect_err("Two attempts should not reach 200.");

	assert!(matches!(err, Error::Request { status: 409, attempts: 2, .. }));
	assert_eq!(vendor.calls(SETTINGS_PATH), 2);
}

#[tokio::test]
async fn exhausted_retries_report_the_last_status() {
	let vendor = vendor_with_api(|_, _| Reply::Json(502, json!({ "error": "Bad gateway" })));
	let session = session(&vendor).await;

	session.set_max_attempts(3);

	let err = session.request(settings()).await.expect_err("Every attempt fails.");

	assert!(matches!(err, Error::Request { status: 502, attempts: 3, .. }));
	assert_eq!(err.status(), Some(502));
	assert_eq!(vendor.calls(SETTINGS_PATH), 3);
}

#[tokio::test]
async fn reenabled_retries_apply_to_the_next_request() {
	let vendor = vendor_with_api(|_, nth| match nth {
		1 | 2 => Reply::Text(409, "Conflict"),
		_ => Reply::Json(200, json!({ "ok": true })),
	});
	let session = session(&vendor).await;

	session.disable_request_retries();

	assert!(session.request(settings()).await.is_err());

	session.enable_request_retries();

	let payload = session.request(settings()).await.expect("Retries should be back on.");

	assert_eq!(payload, json!({ "ok": true }));
	assert!(session.retry_policy().enabled);
}

#[tokio::test]
async fn unauthorized_response_forces_one_refresh_and_resends() {
	let vendor = vendor_with_api(|exchange, _| {
		if exchange.authorization.as_deref() == Some("Bearer access-1") {
			Reply::Text(401, "Unauthorized")
		} else {
			Reply::Json(200, json!({ "settings": {} }))
		}
	});
	let session = session(&vendor).await;

	session.set_max_attempts(1);

	let payload =
		session.request(settings()).await.expect("Resend after refresh should succeed.");

	assert_eq!(payload, json!({ "settings": {} }));
	assert_eq!(vendor.calls(TOKEN_PATH), 2);
	assert_eq!(vendor.calls(SETTINGS_PATH), 2);
	assert_eq!(session.access_token(), "access-2");
	assert_eq!(session.metrics().reauthentications(), 1);
}

#[tokio::test]
async fn second_unauthorized_response_is_terminal() {
	let vendor = vendor_with_api(|_, _| Reply::Text(401, "\"Unauthorized\""));
	let session = session(&vendor).await;
	let err = session.request(settings()).await.expect_err("Repeated 401 should fail.");

	match err {
		Error::InvalidCredentials { reason } => assert_eq!(reason, "Unauthorized"),
		other => panic!("Unexpected error: {other:?}."),
	}

	assert_eq!(vendor.calls(TOKEN_PATH), 2);
	assert_eq!(vendor.calls(SETTINGS_PATH), 2);
}

#[tokio::test]
async fn unauthorized_without_retries_does_not_refresh() {
	let vendor = vendor_with_api(|_, _| Reply::Text(401, "Unauthorized"));
	let session = session(&vendor).await;

	session.disable_request_retries();

	let err = session.request(settings()).await.expect_err("401 should be final.");

	assert!(err.is_invalid_credentials());
	assert_eq!(vendor.calls(TOKEN_PATH), 1);
}

#[tokio::test]
async fn forbidden_response_is_invalid_credentials() {
	let vendor = vendor_with_api(|_, _| Reply::Json(403, json!("Forbidden")));
	let session = session(&vendor).await;
	let err = session.request(settings()).await.expect_err("403 should fail.");

	assert!(err.is_invalid_credentials());
	assert_eq!(vendor.calls(SETTINGS_PATH), 1);
}

#[tokio::test]
async fn other_client_errors_are_not_retried() {
	let vendor = vendor_with_api(|_, _| {
		Reply::Json(404, json!({ "code": 404, "message": "Subscription not found" }))
	});
	let session = session(&vendor).await;
	let err = session.request(settings()).await.expect_err("404 should fail.");

	match err {
		Error::Request { status, message, attempts, path } => {
			assert_eq!(status, 404);
			assert_eq!(message, "Subscription not found");
			assert_eq!(attempts, 1);
			assert_eq!(path, "ss3/subscriptions/1/settings/normal");
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn bodies_are_normalized() {
	let vendor = vendor_with_api(|exchange, _| match exchange.method.as_str() {
		"DELETE" => Reply::Text(200, ""),
		_ => Reply::Text(200, "<html>not json</html>"),
	});
	let session = session(&vendor).await;
	let empty = session
		.request(ApiRequest::delete("ss3/subscriptions/1/settings/normal"))
		.await
		.expect("Empty body should decode as null.");

	assert_eq!(empty, Value::Null);

	let err = session.request(settings()).await.expect_err("HTML body should not decode.");

	assert!(matches!(err, Error::Client(ClientError::MalformedBody { status: Some(200), .. })));
}

#[tokio::test]
async fn typed_requests_report_the_failing_path() {
	#[derive(Debug, Deserialize)]
	struct Settings {
		#[allow(dead_code)]
		settings: Normal,
	}

	#[derive(Debug, Deserialize)]
	struct Normal {
		#[allow(dead_code)]
		normal: Wifi,
	}

	#[derive(Debug, Deserialize)]
	struct Wifi {
		#[serde(rename = "wifiSSID")]
		#[allow(dead_code)]
		wifi_ssid: String,
	}

	let vendor = vendor_with_api(|_, _| {
		Reply::Json(200, json!({ "settings": { "normal": { "wifiSSID": 7 } } }))
	});
	let session = session(&vendor).await;
	let err = session
		.request_as::<Settings>(settings())
		.await
		.expect_err("Mismatched payload should fail.");

	match err {
		Error::Client(ClientError::MalformedBody { source, .. }) =>
			assert_eq!(source.path().to_string(), "settings.normal.wifiSSID"),
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn transport_failures_surface_as_client_errors() {
	let vendor = vendor_with_api(|_, _| Reply::Fail(io::ErrorKind::ConnectionReset));
	let session = session(&vendor).await;
	let err = session.request(settings()).await.expect_err("Transport failure should surface.");

	assert!(matches!(err, Error::Client(ClientError::Network { target: "API", .. })));
}

#[tokio::test]
async fn subscriptions_are_listed_for_the_checked_user() {
	let vendor = vendor_with_api(|exchange, _| {
		assert_eq!(exchange.path, "/v1/users/12345/subscriptions");

		Reply::Json(200, json!({ "subscriptions": [{ "sid": 1, "uid": 12345, "sStatus": 20 }] }))
	});
	let session = session(&vendor).await;
	let subscriptions = session.subscriptions().await.expect("Subscriptions should load.");

	assert_eq!(subscriptions.len(), 1);
	assert_eq!(subscriptions[0].sid, 1);
	assert_eq!(subscriptions[0].uid, USER_ID);
}
