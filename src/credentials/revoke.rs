//! Token revocation.

// self
use crate::{
	_prelude::*,
	auth::OAuthErrorBody,
	credentials::{Credentials, RefreshGrant, error_context},
	error::ConfigError,
	http::{self, HttpTransport},
	obs::{self, FlowKind},
};

impl Credentials {
	/// Revokes the refresh token (or, lacking one, the access token).
	///
	/// On success the credential becomes invalid and is deleted from attached storage. A
	/// rejection leaves both untouched, unless the provider strategy reports that the token was
	/// already unusable, which counts as success. Metadata-server credentials cannot be revoked.
	pub async fn revoke<T>(&self, transport: &T) -> Result<()>
	where
		T: ?Sized + HttpTransport,
	{
		obs::observe(FlowKind::Revoke, "revoke", self.revoke_token(transport)).await
	}

	async fn revoke_token<T>(&self, transport: &T) -> Result<()>
	where
		T: ?Sized + HttpTransport,
	{
		if matches!(self.grant(), RefreshGrant::MetadataServer) {
			return Err(ConfigError::Unsupported {
				kind: self.grant().kind(),
				operation: "revoke",
			}
			.into());
		}

		let token = self
			.refresh_token()
			.or_else(|| self.access_token())
			.ok_or(ConfigError::NoTokenToRevoke)?;
		let request = http::form_post(
			&self.endpoints().revoke_uri,
			&[("token", token.expose())],
			self.user_agent(),
		)?;
		let response = transport.perform(request).await?;
		let status = response.status().as_u16();

		if !response.status().is_success() {
			let body = OAuthErrorBody::parse(response.body());
			let ctx = error_context(status, None, &body, response.body());

			if !self.strategy.revoke_reports_already_invalid(&ctx) {
				let message =
					body.message().unwrap_or_else(|| format!("Invalid response {status}."));

				return Err(Error::RevokeRejected { status, message });
			}
		}

		self.state.write().invalid = true;

		if let Some(store) = self.store() {
			store.delete().await?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		store::{MemoryStorage, Storage},
	};

	#[tokio::test]
	async fn success_invalidates_and_deletes() {
		let credentials = Credentials::refresh_token_grant("client", Some("secret"))
			.refresh_token("rt")
			.access_token("at")
			.revoke_uri("https://example.com/revoke")
			.build();
		let store: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
		let transport = MockTransport::new().with_text(200, "");

		store.put(&credentials).await.expect("Put should succeed.");
		credentials.set_store(&store);
		credentials.revoke(&transport).await.expect("Revoke should succeed.");

		let requests = transport.requests();

		assert!(credentials.invalid());
		assert!(store.get().await.expect("Get should succeed.").is_none());
		assert_eq!(requests[0].uri, "https://example.com/revoke");
		assert_eq!(requests[0].form()["token"], "rt");
	}

	#[tokio::test]
	async fn access_token_is_revoked_when_no_refresh_token() {
		let credentials = Credentials::access_token_only("at", None).build();
		let transport = MockTransport::new().with_text(200, "");

		credentials.revoke(&transport).await.expect("Revoke should succeed.");

		assert_eq!(transport.requests()[0].form()["token"], "at");
	}

	#[tokio::test]
	async fn rejection_leaves_state_untouched() {
		let credentials = Credentials::access_token_only("at", None).build();
		let store: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
		let transport = MockTransport::new().with_json(
			400,
			json!({"error": "invalid_request", "error_description": "Bad token."}),
		);

		store.put(&credentials).await.expect("Put should succeed.");
		credentials.set_store(&store);

		let err = credentials.revoke(&transport).await.expect_err("Revoke should fail.");

		assert_eq!(err.to_string(), "invalid_request: Bad token.");
		assert!(!credentials.invalid());
		assert!(store.get().await.expect("Get should succeed.").is_some());
	}

	#[tokio::test]
	async fn already_invalid_tokens_count_as_revoked() {
		let credentials = Credentials::access_token_only("at", None).build();
		let store: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
		let transport = MockTransport::new().with_json(400, json!({"error": "invalid_token"}));

		store.put(&credentials).await.expect("Put should succeed.");
		credentials.set_store(&store);
		credentials.revoke(&transport).await.expect("Already invalid tokens should revoke.");

		assert!(credentials.invalid());
		assert!(store.get().await.expect("Get should succeed.").is_none());
	}

	#[tokio::test]
	async fn generic_failures_name_the_status() {
		let credentials = Credentials::access_token_only("at", None).build();
		let transport = MockTransport::new().with_text(503, "down");
		let err = credentials.revoke(&transport).await.expect_err("Revoke should fail.");

		assert_eq!(err.to_string(), "Invalid response 503.");
	}

	#[tokio::test]
	async fn metadata_credentials_refuse_revoke() {
		let credentials = Credentials::metadata_server().access_token("at").build();
		let transport = MockTransport::new();
		let err = credentials.revoke(&transport).await.expect_err("Revoke should be refused.");

		assert!(matches!(err, Error::Config(ConfigError::Unsupported { operation: "revoke", .. })));
		assert!(transport.requests().is_empty());
	}
}
