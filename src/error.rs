//! Crate-level error types shared by credentials, flows, storage, and discovery.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// No application default credentials could be located.
	#[error(transparent)]
	Discovery(#[from] crate::adc::DiscoveryError),
	/// A credential file could not be read or is missing required fields.
	#[error(transparent)]
	CredentialFile(#[from] crate::adc::CredentialFileError),
	/// An ID token in a token response could not be decoded.
	#[error(transparent)]
	IdToken(#[from] crate::auth::IdTokenError),

	/// Provider rejected a refresh request.
	#[error("{message}")]
	RefreshRejected {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// `error: error_description` from the body, or a generic status message.
		message: String,
	},
	/// Provider rejected a revoke request; the credential is left untouched.
	#[error("{message}")]
	RevokeRejected {
		/// HTTP status returned by the revoke endpoint.
		status: u16,
		/// Provider-supplied error, or a generic status message.
		message: String,
	},
	/// Token info endpoint refused to describe the access token.
	#[error("{message}")]
	TokenInfo {
		/// HTTP status returned by the token info endpoint.
		status: u16,
		/// Provider-supplied `error_description`, or a generic status message.
		message: String,
	},
	/// Authorization code exchange failed.
	#[error("{message}")]
	FlowExchange {
		/// Provider- or caller-supplied failure description.
		message: String,
	},
	/// The credential has no material to mint a new access token.
	#[error("The access_token is expired or invalid and can't be refreshed.")]
	UnrefreshableCredential,
	/// The credential was revoked or permanently rejected and cannot be used again.
	#[error("Credentials are invalid and must be re-authorized.")]
	InvalidCredential,
	/// A header value cannot be represented as ASCII.
	#[error("Header `{name}` contains non-ASCII characters.")]
	NonAsciiHeader {
		/// Name of the offending header.
		name: String,
	},
	/// The request stayed unauthorized after the single refresh-and-retry.
	#[error("Request was still rejected with status {status} after refreshing the access token.")]
	AuthorizationRejected {
		/// HTTP status of the retried response.
		status: u16,
		/// Body of the retried response, lossily decoded.
		body: String,
	},
	/// Token endpoint answered successfully but the payload is unusable.
	#[error("{message}")]
	InvalidTokenResponse {
		/// Description of what is missing or malformed.
		message: String,
	},
	/// The refresh assertion could not be signed.
	#[error("Failed to sign the token assertion.")]
	AssertionSigning {
		/// Underlying signer failure.
		#[source]
		source: BoxError,
	},
}
impl Error {
	/// Wraps a signer failure inside [`Error::AssertionSigning`].
	pub fn assertion_signing(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::AssertionSigning { source: Box::new(src) }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// A header name or value is not legal on the wire.
	#[error("Header `{name}` cannot be sent.")]
	InvalidHeader {
		/// Name of the offending header.
		name: String,
	},
	/// Redirect URI was never configured.
	#[error("A redirect URI must be set before building the authorization URL.")]
	MissingRedirectUri,
	/// Revoke was requested on a credential that holds no token.
	#[error("Credentials hold no token to revoke.")]
	NoTokenToRevoke,
	/// The credential variant does not support the requested operation.
	#[error("{kind} credentials do not support {operation}.")]
	Unsupported {
		/// Credential variant label.
		kind: &'static str,
		/// Operation label.
		operation: &'static str,
	},
	/// Persisted credentials JSON could not be decoded.
	#[error("Persisted credentials are malformed.")]
	CredentialsJson {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Credentials could not be encoded as JSON.
	#[error("Credentials could not be serialized.")]
	CredentialsSerialize {
		/// Underlying encoder failure.
		#[source]
		source: serde_json::Error,
	},
	/// Token expiry could not be formatted.
	#[error("Token expiry could not be formatted.")]
	ExpiryFormat(#[from] time::error::Format),
	/// Persisted credentials lack a field their variant requires.
	#[error("Persisted credentials are missing `{field}`.")]
	MissingCredentialField {
		/// Name of the absent field.
		field: &'static str,
	},
	/// A credential file could not be written.
	#[error("Failed to write credentials to {path}.")]
	CredentialsWrite {
		/// Destination path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Persisted assertion credentials were restored without a signer.
	#[error("Assertion credentials need a signer to be restored.")]
	MissingAssertionSigner,
	/// Well-known config directory is absent.
	#[error("Config directory does not exist: {dir}")]
	MissingConfigDirectory {
		/// Directory that was expected to exist.
		dir: String,
	},
	/// Neither a config override nor a home directory is available.
	#[error("Unable to resolve the well-known credentials file location.")]
	WellKnownFileUnresolved,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_with_source() {
		let store_error = StoreError::Backend { message: "disk unplugged".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk unplugged"));

		let source = error.source().expect("Error should expose the store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn unrefreshable_message_is_stable() {
		assert_eq!(
			Error::UnrefreshableCredential.to_string(),
			"The access_token is expired or invalid and can't be refreshed."
		);
	}

	#[test]
	fn config_directory_message_names_the_directory() {
		let error = ConfigError::MissingConfigDirectory { dir: "/nowhere/gcloud".into() };

		assert_eq!(error.to_string(), "Config directory does not exist: /nowhere/gcloud");
	}
}
