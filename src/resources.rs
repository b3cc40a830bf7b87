//! Typed mappers for the vendor endpoints the session itself depends on.

// self
use crate::{
	_prelude::*,
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
	session::{ApiRequest, Session},
};

/// Identity of the account the access token belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCheck {
	/// Vendor user id; scopes most other resource paths.
	#[serde(rename = "userId")]
	pub user_id: u64,
	/// Whether the account administers its subscriptions.
	#[serde(rename = "isAdmin", default)]
	pub is_admin: bool,
}

/// Monitoring subscription attached to the account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
	/// Subscription id.
	pub sid: u64,
	/// Owning user id.
	pub uid: u64,
	/// Remaining vendor fields, kept verbatim.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct SubscriptionsEnvelope {
	subscriptions: Vec<Subscription>,
}

impl<C, M> Session<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Asks the API who the current access token belongs to.
	pub async fn auth_check(&self) -> Result<AuthCheck> {
		self.request_as(ApiRequest::get("api/authCheck")).await
	}

	/// Lists the account's subscriptions.
	pub async fn subscriptions(&self) -> Result<Vec<Subscription>> {
		let user_id = match self.user_id() {
			Some(user_id) => user_id,
			None => self.auth_check().await?.user_id,
		};
		let envelope = self
			.request_as::<SubscriptionsEnvelope>(ApiRequest::get(format!(
				"users/{user_id}/subscriptions"
			)))
			.await?;

		Ok(envelope.subscriptions)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn payloads_decode_vendor_field_names() {
		let auth: AuthCheck = serde_json::from_str(r#"{"userId":12345,"isAdmin":false}"#)
			.expect("Auth check payload should decode.");

		assert_eq!(auth, AuthCheck { user_id: 12345, is_admin: false });

		let envelope: SubscriptionsEnvelope = serde_json::from_str(
			r#"{"subscriptions":[{"sid":12345,"uid":12345,"sStatus":20,"location":{"street1":"1234 Main Street"}}]}"#,
		)
		.expect("Subscriptions payload should decode.");

		assert_eq!(envelope.subscriptions.len(), 1);
		assert_eq!(envelope.subscriptions[0].sid, 12345);
		assert_eq!(envelope.subscriptions[0].extra["sStatus"], 20);
	}
}
