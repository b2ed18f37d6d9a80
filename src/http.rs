//! Transport boundary and request helpers.
//!
//! Credentials only ever talk to providers through [`HttpTransport::perform`], which takes a fully
//! built [`HttpRequest`] and yields the raw [`HttpResponse`]. TLS, pooling, and timeouts belong
//! to the transport. The crate ships [`ReqwestHttpClient`] behind the default `reqwest` feature.

// crates.io
use http::{
	HeaderName, HeaderValue, Method,
	header::{CONTENT_TYPE, USER_AGENT},
};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{_prelude::*, error::ConfigError};

/// Request type handed to transports.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Response type returned by transports.
pub type HttpResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::perform`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP stack used for every provider call.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by many
/// credentials, and the returned futures must be `Send` so callers can drive them on any
/// executor.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the complete response.
	///
	/// Non-2xx statuses are responses, not errors; only connection-level failures are
	/// reported as [`TransportError`].
	fn perform(&self, request: HttpRequest) -> TransportFuture<'_>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	fn perform(&self, request: HttpRequest) -> TransportFuture<'_> {
		(**self).perform(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests give up after `timeout`.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, ConfigError> {
		Ok(Self(ReqwestClient::builder().timeout(timeout).build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn perform(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Appends `params` to the query string of `uri`.
///
/// Existing pairs survive untouched and values are form-encoded, so `d&` becomes `d%26`.
pub fn update_query_params<K, V>(uri: &str, params: &[(K, V)]) -> String
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	if params.is_empty() {
		return uri.to_owned();
	}

	let (base, fragment) = match uri.split_once('#') {
		Some((base, fragment)) => (base, Some(fragment)),
		None => (uri, None),
	};
	let separator = match base.find('?') {
		None => "?",
		Some(_) if base.ends_with('?') || base.ends_with('&') => "",
		Some(_) => "&",
	};
	let mut updated = format!("{base}{separator}{}", encode_form(params));

	if let Some(fragment) = fragment {
		updated.push('#');
		updated.push_str(fragment);
	}

	updated
}

/// Encodes pairs as an `application/x-www-form-urlencoded` string.
pub fn encode_form<K, V>(params: &[(K, V)]) -> String
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	let mut serializer = FormSerializer::new(String::new());

	for (key, value) in params {
		serializer.append_pair(key.as_ref(), value.as_ref());
	}

	serializer.finish()
}

/// Validates a header pair, rejecting non-ASCII values before anything is sent.
///
/// Values are normalized through [`Display`], so numbers and booleans are accepted as-is.
pub fn header_pair(name: &str, value: impl Display) -> Result<(HeaderName, HeaderValue)> {
	let value = value.to_string();

	if !name.is_ascii() || !value.is_ascii() {
		return Err(Error::NonAsciiHeader { name: name.to_owned() });
	}

	let header_name = HeaderName::from_bytes(name.as_bytes())
		.map_err(|_| ConfigError::InvalidHeader { name: name.to_owned() })?;
	let header_value = HeaderValue::from_str(&value)
		.map_err(|_| ConfigError::InvalidHeader { name: name.to_owned() })?;

	Ok((header_name, header_value))
}

/// Builds a form POST, optionally tagged with a user agent.
pub(crate) fn form_post<K, V>(
	uri: &str,
	params: &[(K, V)],
	user_agent: Option<&str>,
) -> Result<HttpRequest>
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	let mut builder = http::Request::builder()
		.method(Method::POST)
		.uri(uri)
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE);

	if let Some(user_agent) = user_agent {
		builder = builder.header(USER_AGENT, header_pair(USER_AGENT.as_str(), user_agent)?.1);
	}

	Ok(builder.body(encode_form(params).into_bytes()).map_err(ConfigError::from)?)
}

/// Builds a bodiless GET.
pub(crate) fn get(uri: &str, headers: &[(&str, &str)]) -> Result<HttpRequest> {
	let mut builder = http::Request::builder().method(Method::GET).uri(uri);

	for (name, value) in headers {
		let (name, value) = header_pair(name, value)?;

		builder = builder.header(name, value);
	}

	Ok(builder.body(Vec::new()).map_err(ConfigError::from)?)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn query_params_are_added_to_bare_uris() {
		assert_eq!(update_query_params("http://x.com", &[("a", "b")]), "http://x.com?a=b");
	}

	#[test]
	fn query_params_are_appended_to_existing_queries() {
		let updated = update_query_params("http://x.com?x=y", &[("a", "b"), ("c", "d&")]);

		assert_eq!(updated, "http://x.com?x=y&a=b&c=d%26");
		assert_eq!(update_query_params("http://x.com?", &[("a", "b")]), "http://x.com?a=b");
		assert_eq!(
			update_query_params("http://x.com/p#frag", &[("a", "b")]),
			"http://x.com/p?a=b#frag"
		);
		assert_eq!(update_query_params::<&str, &str>("http://x.com?x=y", &[]), "http://x.com?x=y");
	}

	#[test]
	fn headers_normalize_display_values() {
		let (name, value) = header_pair("X-Retry", 3).expect("Numeric header should be accepted.");

		assert_eq!(name.as_str(), "x-retry");
		assert_eq!(value.to_str().expect("Value should be ASCII."), "3");
	}

	#[test]
	fn headers_reject_non_ascii() {
		let err =
			header_pair("X-Name", "caf\u{e9}").expect_err("Non-ASCII value must be rejected.");

		assert!(matches!(err, Error::NonAsciiHeader { ref name } if name == "X-Name"));

		let err = header_pair("X-Line", "a\nb").expect_err("Control characters must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidHeader { .. })));
	}

	#[test]
	fn form_posts_carry_content_type_and_user_agent() {
		let request = form_post(
			"https://example.com/token",
			&[("grant_type", "refresh_token")],
			Some("agent/1"),
		)
		.expect("Form POST should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.headers()[CONTENT_TYPE], FORM_CONTENT_TYPE);
		assert_eq!(request.headers()[USER_AGENT], "agent/1");
		assert_eq!(request.body().as_slice(), b"grant_type=refresh_token");
	}
}
