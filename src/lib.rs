//! OAuth 2.0 credential lifecycle for Rust: refresh, revoke, persist, and authorize requests, and
//! discover application default credentials when nothing is configured explicitly.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod adc;
pub mod auth;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use serde_json::Value;
	// self
	use crate::{
		credentials::ServiceAccountKey,
		http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	};

	/// Public half of the fixture service account key.
	pub const FIXTURE_PUBLIC_KEY_PEM: &str =
		include_str!("../tests/data/service_account_key.pub.pem");

	/// Service account key backed by the RSA fixture under `tests/data`.
	pub fn fixture_service_account_key() -> ServiceAccountKey {
		ServiceAccountKey {
			client_id: "fixture-client".into(),
			client_email: "svc@example.iam.gserviceaccount.com".into(),
			private_key_id: "fixture-key-id".into(),
			private_key: include_str!("../tests/data/service_account_key.pem").into(),
			token_uri: None,
		}
	}

	/// Request captured by [`MockTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URI.
		pub uri: String,
		/// Header pairs in send order.
		pub headers: Vec<(String, String)>,
		/// Raw body.
		pub body: Vec<u8>,
	}
	impl RecordedRequest {
		/// Captures `request`.
		pub fn from_request(request: &HttpRequest) -> Self {
			Self {
				method: request.method().to_string(),
				uri: request.uri().to_string(),
				headers: request
					.headers()
					.iter()
					.map(|(name, value)| {
						(name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
					})
					.collect(),
				body: request.body().to_owned(),
			}
		}

		/// First value of header `name`, matched case-insensitively.
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers
				.iter()
				.find(|(key, _)| key.eq_ignore_ascii_case(name))
				.map(|(_, value)| value.as_str())
		}

		/// Body decoded as a form.
		pub fn form(&self) -> BTreeMap<String, String> {
			url::form_urlencoded::parse(&self.body).into_owned().collect()
		}
	}

	/// Scripted transport that replays queued responses and records every request.
	///
	/// Once the script runs out, requests fail with a transport error.
	#[derive(Debug, Default)]
	pub struct MockTransport {
		responses: Mutex<VecDeque<HttpResponse>>,
		requests: Mutex<Vec<RecordedRequest>>,
	}
	impl MockTransport {
		/// Transport with an empty script.
		pub fn new() -> Self {
			Self::default()
		}

		/// Queues a response with explicit headers.
		pub fn with_response(self, status: u16, headers: &[(&str, &str)], body: &[u8]) -> Self {
			let mut builder = ::http::Response::builder().status(status);

			for (name, value) in headers {
				builder = builder.header(*name, *value);
			}

			let response = builder.body(body.to_vec()).expect("Scripted response should build.");

			self.responses.lock().push_back(response);

			self
		}

		/// Queues a JSON response.
		pub fn with_json(self, status: u16, body: Value) -> Self {
			let body = body.to_string();

			self.with_response(status, &[("content-type", "application/json")], body.as_bytes())
		}

		/// Queues a plain-text response.
		pub fn with_text(self, status: u16, body: &str) -> Self {
			self.with_response(status, &[], body.as_bytes())
		}

		/// Requests seen so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}
	}
	impl HttpTransport for MockTransport {
		fn perform(&self, request: HttpRequest) -> TransportFuture<'_> {
			self.requests.lock().push(RecordedRequest::from_request(&request));

			let next = self.responses.lock().pop_front();

			Box::pin(async move {
				next.ok_or_else(|| {
					TransportError::Io(std::io::Error::other("Mock transport script exhausted."))
				})
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result, TransportError};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;
