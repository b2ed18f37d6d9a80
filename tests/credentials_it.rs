#![cfg(feature = "reqwest")]

// std
use std::{path::PathBuf, sync::Arc};
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use oauth2_credentials::{
	credentials::{AuthorizedRequest, CredentialStatus, Credentials},
	error::Error,
	http::ReqwestHttpClient,
	provider::ProviderEndpoints,
	reqwest,
	store::{FileStorage, Storage, load_attached},
};

fn http_client() -> ReqwestHttpClient {
	let client = reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.build()
		.expect("Test HTTP client should build.");

	ReqwestHttpClient::with_client(client)
}

fn endpoints(server: &MockServer) -> ProviderEndpoints {
	ProviderEndpoints::google()
		.with_token_uri(server.url("/token"))
		.with_revoke_uri(server.url("/revoke"))
		.with_token_info_uri(server.url("/tokeninfo"))
}

fn temp_path(label: &str) -> PathBuf {
	std::env::temp_dir().join(format!(
		"oauth2-credentials-it-{label}-{}-{}.json",
		std::process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	))
}

fn user_credentials(server: &MockServer, access_token: &str) -> Credentials {
	Credentials::refresh_token_grant("client-it", Some("secret-it"))
		.refresh_token("refresh-it")
		.access_token(access_token)
		.endpoints(endpoints(server))
		.build()
}

#[tokio::test]
async fn refresh_writes_back_through_file_storage() {
	let server = MockServer::start_async().await;
	let path = temp_path("refresh");
	let seeded = Credentials::refresh_token_grant("client-it", Some("secret-it"))
		.refresh_token("refresh-it")
		.access_token("access-old")
		.token_expiry(OffsetDateTime::now_utc() - Duration::minutes(1))
		.endpoints(endpoints(&server))
		.build();
	let store: Arc<dyn Storage> = Arc::new(FileStorage::new(&path));

	store.put(&seeded).await.expect("Seeding the file store should succeed.");

	let credentials = load_attached(&store)
		.await
		.expect("Loading from the file store should succeed.")
		.expect("Seeded credentials should be present.");

	assert_eq!(credentials.status(), CredentialStatus::Stale);

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-new\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
		})
		.await;

	credentials
		.refresh(&http_client())
		.await
		.expect("Refresh against the mock provider should succeed.");

	mock.assert_async().await;

	assert_eq!(credentials.status(), CredentialStatus::Fresh);

	let reloaded = FileStorage::new(&path)
		.get()
		.await
		.expect("Reading back the file store should succeed.")
		.expect("Refreshed credentials should be persisted.");

	assert_eq!(reloaded.access_token().as_ref().map(|t| t.expose()), Some("access-new"));
	assert_eq!(reloaded.refresh_token().as_ref().map(|t| t.expose()), Some("refresh-it"));
	assert!(!reloaded.access_token_expired());

	let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn rejected_refresh_marks_credentials_invalid() {
	let server = MockServer::start_async().await;
	let credentials = user_credentials(&server, "access-old");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Token revoked.\"}");
		})
		.await;
	let err = credentials
		.refresh(&http_client())
		.await
		.expect_err("Refresh should be rejected.");

	mock.assert_async().await;

	assert!(matches!(err, Error::RefreshRejected { status: 400, .. }));
	assert_eq!(err.to_string(), "invalid_grant: Token revoked.");
	assert_eq!(credentials.status(), CredentialStatus::Invalid);
}

#[tokio::test]
async fn authorized_requests_refresh_once_on_unauthorized() {
	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/api").header("authorization", "Bearer access-stale");
			then.status(401).body("expired");
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/api").header("authorization", "Bearer access-fresh");
			then.status(200).body("payload");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-fresh\",\"expires_in\":3600}");
		})
		.await;
	let credentials = Arc::new(user_credentials(&server, "access-stale"));
	let client = credentials.authorize(http_client());
	let response = client
		.send(AuthorizedRequest::get(server.url("/api")).header("User-Agent", "it/1"))
		.await
		.expect("Authorized request should succeed after one refresh.");

	stale.assert_async().await;
	token.assert_async().await;
	fresh.assert_async().await;

	assert_eq!(response.status(), 200);
	assert_eq!(response.body().as_slice(), b"payload");
}

#[tokio::test]
async fn token_info_and_revoke_round_trip() {
	let server = MockServer::start_async().await;
	let credentials = user_credentials(&server, "access-live");
	let info = server
		.mock_async(|when, then| {
			when.method(GET).path("/tokeninfo").query_param("access_token", "access-live");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"scope\":\"email profile\",\"expires_in\":1200}");
		})
		.await;
	let transport = http_client();
	let scopes = credentials
		.retrieve_scopes(&transport)
		.await
		.expect("Token info lookup should succeed.");

	info.assert_async().await;

	assert_eq!(scopes.normalized(), "email profile");
	assert!(credentials.has_scopes(["email", "profile"]));

	let revoke = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/revoke")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200);
		})
		.await;

	credentials.revoke(&transport).await.expect("Revoke should succeed.");
	revoke.assert_async().await;

	assert!(credentials.invalid());
	assert!(matches!(credentials.refresh(&transport).await, Err(Error::InvalidCredential)));
}
