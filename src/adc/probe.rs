//! Compute metadata server detection.

// crates.io
use http::StatusCode;
// self
use crate::{
	_prelude::*,
	http::{HttpTransport, get},
	obs::{self, FlowKind},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Address probed for a metadata server.
pub const METADATA_PROBE_URI: &str = "http://169.254.169.254/";
/// Header the metadata server echoes back.
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
/// Expected value of [`METADATA_FLAVOR_HEADER`].
pub const METADATA_FLAVOR: &str = "Google";
/// Upper bound on a single probe.
pub const PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

/// Boxed future returned by [`MetadataProbe::is_present`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + 'a + Send>>;

/// Decides whether a compute metadata server is reachable.
pub trait MetadataProbe
where
	Self: Send + Sync,
{
	/// Resolves to true when the server answered as expected. Failures of any kind mean absent.
	fn is_present(&self) -> ProbeFuture<'_>;
}

/// Probe that issues one flagged `GET` through an [`HttpTransport`].
///
/// The transport owns the timeout; [`HttpMetadataProbe::reqwest`] builds one bounded by
/// [`PROBE_TIMEOUT`]. There is no retry.
#[derive(Debug)]
pub struct HttpMetadataProbe<T> {
	transport: T,
	uri: String,
}
impl<T> HttpMetadataProbe<T>
where
	T: HttpTransport,
{
	/// Probes [`METADATA_PROBE_URI`] through `transport`.
	pub fn new(transport: T) -> Self {
		Self { transport, uri: METADATA_PROBE_URI.into() }
	}

	/// Probes another address.
	pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = uri.into();

		self
	}

	async fn request(&self) -> Result<bool> {
		let request = get(&self.uri, &[(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)])?;
		let response = self.transport.perform(request).await?;
		let flavor = response.headers().get(METADATA_FLAVOR_HEADER);

		Ok(response.status() == StatusCode::OK
			&& flavor.is_some_and(|value| value.as_bytes() == METADATA_FLAVOR.as_bytes()))
	}
}
#[cfg(feature = "reqwest")]
impl HttpMetadataProbe<ReqwestHttpClient> {
	/// Probe backed by a reqwest client that gives up after [`PROBE_TIMEOUT`].
	pub fn reqwest() -> Result<Self> {
		Ok(Self::new(ReqwestHttpClient::with_timeout(PROBE_TIMEOUT)?))
	}
}
impl<T> MetadataProbe for HttpMetadataProbe<T>
where
	T: HttpTransport,
{
	fn is_present(&self) -> ProbeFuture<'_> {
		Box::pin(async move {
			obs::observe(FlowKind::Discovery, "metadata_probe", self.request())
				.await
				.unwrap_or(false)
		})
	}
}
