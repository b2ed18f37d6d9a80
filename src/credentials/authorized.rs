//! Bearer-authorized requests with a single refresh-and-retry.

// crates.io
use http::{
	Method,
	header::{AUTHORIZATION, USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	credentials::Credentials,
	error::ConfigError,
	http::{HttpRequest, HttpResponse, HttpTransport, header_pair},
	provider::RetryPolicy,
};

/// Request description sent through an [`AuthorizedHttpClient`].
///
/// Headers are validated when the request is sent, before anything reaches the network.
#[derive(Clone, Debug)]
pub struct AuthorizedRequest {
	method: Method,
	uri: String,
	headers: Vec<(String, String)>,
	body: Vec<u8>,
}
impl AuthorizedRequest {
	/// Starts a request with the given method and URI.
	pub fn new(method: Method, uri: impl Into<String>) -> Self {
		Self { method, uri: uri.into(), headers: Vec::new(), body: Vec::new() }
	}

	/// Shorthand for a `GET`.
	pub fn get(uri: impl Into<String>) -> Self {
		Self::new(Method::GET, uri)
	}

	/// Shorthand for a `POST`.
	pub fn post(uri: impl Into<String>) -> Self {
		Self::new(Method::POST, uri)
	}

	/// Adds a header; the value is rendered through [`Display`].
	pub fn header(mut self, name: impl Into<String>, value: impl Display) -> Self {
		self.headers.push((name.into(), value.to_string()));

		self
	}

	/// Sets the body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	fn validate(&self) -> Result<()> {
		for (name, value) in &self.headers {
			header_pair(name, value)?;
		}

		Ok(())
	}
}

/// Transport wrapper that signs every request with a credential's access token.
///
/// Tokens are refreshed before sending when missing or expired. A response whose status the
/// credential's [`RetryPolicy`] marks as refresh-worthy triggers exactly one refresh and resend;
/// a second such response fails with [`Error::AuthorizationRejected`].
pub struct AuthorizedHttpClient<T> {
	credentials: Arc<Credentials>,
	transport: T,
}
impl<T> AuthorizedHttpClient<T>
where
	T: HttpTransport,
{
	/// Pairs `credentials` with `transport`.
	pub fn new(credentials: Arc<Credentials>, transport: T) -> Self {
		Self { credentials, transport }
	}

	/// Credential used for signing.
	pub fn credentials(&self) -> &Arc<Credentials> {
		&self.credentials
	}

	/// Underlying transport.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Sends `request` with a bearer token attached.
	pub async fn send(&self, request: AuthorizedRequest) -> Result<HttpResponse> {
		request.validate()?;

		if self.credentials.needs_refresh() {
			self.credentials.refresh(&self.transport).await?;
		}

		let mut refreshed = false;

		loop {
			let response = self.transport.perform(self.sign(&request)?).await?;
			let attempt = Attempt::of(&response, self.credentials.retry_policy());

			if !attempt.needs_retry {
				return Ok(response);
			}
			if refreshed {
				return Err(Error::AuthorizationRejected {
					status: attempt.status,
					body: String::from_utf8_lossy(response.body()).into_owned(),
				});
			}

			self.credentials.refresh(&self.transport).await?;

			refreshed = true;
		}
	}

	fn sign(&self, request: &AuthorizedRequest) -> Result<HttpRequest> {
		let token = self.credentials.access_token().ok_or(Error::UnrefreshableCredential)?;
		let mut builder = http::Request::builder().method(request.method.clone()).uri(&request.uri);
		let mut caller_agent = None;

		for (name, value) in &request.headers {
			if name.eq_ignore_ascii_case(USER_AGENT.as_str()) {
				caller_agent = Some(value.as_str());
			} else if !name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
				let (name, value) = header_pair(name, value)?;

				builder = builder.header(name, value);
			}
		}

		let user_agent = match (self.credentials.user_agent(), caller_agent) {
			(Some(ours), Some(theirs)) => Some(format!("{ours} {theirs}")),
			(Some(ours), None) => Some(ours.to_owned()),
			(None, theirs) => theirs.map(ToOwned::to_owned),
		};

		if let Some(user_agent) = user_agent {
			builder = builder.header(USER_AGENT, header_pair(USER_AGENT.as_str(), user_agent)?.1);
		}

		builder = builder.header(
			AUTHORIZATION,
			header_pair(AUTHORIZATION.as_str(), format!("Bearer {}", token.expose()))?.1,
		);

		Ok(builder.body(request.body.clone()).map_err(ConfigError::from)?)
	}
}
impl<T> Debug for AuthorizedHttpClient<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedHttpClient").field("credentials", &self.credentials).finish()
	}
}

struct Attempt {
	status: u16,
	needs_retry: bool,
}
impl Attempt {
	fn of(response: &HttpResponse, policy: &RetryPolicy) -> Self {
		let status = response.status().as_u16();

		Self { status, needs_retry: policy.is_refresh_worthy(status) }
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	fn user_credentials() -> Arc<Credentials> {
		Arc::new(
			Credentials::refresh_token_grant("client", Some("secret"))
				.refresh_token("rt")
				.access_token("stale")
				.user_agent("lib/1")
				.build(),
		)
	}

	#[tokio::test]
	async fn attaches_bearer_and_prefixes_user_agent() {
		let transport = Arc::new(MockTransport::new().with_text(200, "ok"));
		let client = user_credentials().authorize(transport.clone());
		let response = client
			.send(
				AuthorizedRequest::get("https://api.example.com/v1")
					.header("User-Agent", "app/2")
					.header("X-Count", 3),
			)
			.await
			.expect("Request should succeed.");
		let requests = transport.requests();
		let sent = &requests[0];

		assert_eq!(response.status(), 200);
		assert_eq!(sent.header("authorization"), Some("Bearer stale"));
		assert_eq!(sent.header("user-agent"), Some("lib/1 app/2"));
		assert_eq!(sent.header("x-count"), Some("3"));
	}

	#[tokio::test]
	async fn unauthorized_triggers_one_refresh_and_resend() {
		let transport = Arc::new(
			MockTransport::new()
				.with_text(401, "expired")
				.with_json(200, json!({"access_token": "fresh"}))
				.with_text(200, "ok"),
		);
		let client = user_credentials().authorize(transport.clone());
		let response = client
			.send(AuthorizedRequest::get("https://api.example.com/v1"))
			.await
			.expect("Retry should succeed.");
		let requests = transport.requests();

		assert_eq!(response.body(), b"ok");
		assert_eq!(requests.len(), 3);
		assert_eq!(requests[0].header("authorization"), Some("Bearer stale"));
		assert_eq!(requests[2].header("authorization"), Some("Bearer fresh"));
	}

	#[tokio::test]
	async fn second_rejection_is_an_error() {
		let transport = Arc::new(
			MockTransport::new()
				.with_text(401, "expired")
				.with_json(200, json!({"access_token": "fresh"}))
				.with_text(401, "still no"),
		);
		let client = user_credentials().authorize(transport.clone());
		let err = client
			.send(AuthorizedRequest::get("https://api.example.com/v1"))
			.await
			.expect_err("Second 401 should fail.");

		assert!(matches!(
			err,
			Error::AuthorizationRejected { status: 401, ref body } if body == "still no"
		));
		assert_eq!(transport.requests().len(), 3);
	}

	#[tokio::test]
	async fn non_ascii_headers_fail_before_sending() {
		let transport = Arc::new(MockTransport::new());
		let client = user_credentials().authorize(transport.clone());
		let err = client
			.send(AuthorizedRequest::get("https://api.example.com").header("X-Name", "café"))
			.await
			.expect_err("Non-ASCII header should be rejected.");

		assert!(matches!(err, Error::NonAsciiHeader { ref name } if name == "X-Name"));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn missing_token_is_fetched_first() {
		let credentials = Arc::new(
			Credentials::refresh_token_grant("client", None).refresh_token("rt").build(),
		);
		let transport = Arc::new(
			MockTransport::new()
				.with_json(200, json!({"access_token": "first"}))
				.with_text(200, "ok"),
		);
		let client = credentials.authorize(transport.clone());

		client
			.send(AuthorizedRequest::post("https://api.example.com").body("payload"))
			.await
			.expect("Request should succeed.");

		let requests = transport.requests();
		let sent = &requests[1];

		assert_eq!(sent.header("authorization"), Some("Bearer first"));
		assert_eq!(sent.body, b"payload");
	}

	#[tokio::test]
	async fn forbidden_is_retried_only_when_opted_in() {
		let credentials = Arc::new(
			Credentials::refresh_token_grant("client", None)
				.refresh_token("rt")
				.access_token("at")
				.retry_policy(RetryPolicy::default().with_forbidden())
				.build(),
		);
		let transport = Arc::new(
			MockTransport::new()
				.with_text(403, "nope")
				.with_json(200, json!({"access_token": "fresh"}))
				.with_text(200, "ok"),
		);
		let response = credentials
			.authorize(transport.clone())
			.send(AuthorizedRequest::get("https://api.example.com"))
			.await
			.expect("Retry should succeed.");

		assert_eq!(response.status(), 200);

		let plain = Arc::new(MockTransport::new().with_text(403, "nope"));
		let response = user_credentials()
			.authorize(plain.clone())
			.send(AuthorizedRequest::get("https://api.example.com"))
			.await
			.expect("403 should pass through.");

		assert_eq!(response.status(), 403);
		assert_eq!(plain.requests().len(), 1);
	}
}
