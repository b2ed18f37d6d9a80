//! Provider endpoint set.

// self
use crate::_prelude::*;

/// Google's OAuth 2.0 authorization endpoint.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Google's OAuth 2.0 revocation endpoint.
pub const GOOGLE_REVOKE_URI: &str = "https://oauth2.googleapis.com/revoke";
/// Google's token info endpoint.
pub const GOOGLE_TOKEN_INFO_URI: &str = "https://oauth2.googleapis.com/tokeninfo";
/// Compute metadata endpoint serving access tokens for the default service account.
pub const METADATA_TOKEN_URI: &str =
	"http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// URIs a credential or flow talks to.
///
/// Kept as plain strings so persisted credentials round-trip them byte for byte.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint used to build consent URLs.
	pub auth_uri: String,
	/// Token endpoint used for exchanges and refreshes.
	pub token_uri: String,
	/// Revocation endpoint.
	pub revoke_uri: String,
	/// Token info endpoint used to discover granted scopes.
	pub token_info_uri: String,
}
impl ProviderEndpoints {
	/// Google's public OAuth 2.0 endpoints.
	pub fn google() -> Self {
		Self {
			auth_uri: GOOGLE_AUTH_URI.into(),
			token_uri: GOOGLE_TOKEN_URI.into(),
			revoke_uri: GOOGLE_REVOKE_URI.into(),
			token_info_uri: GOOGLE_TOKEN_INFO_URI.into(),
		}
	}

	/// Replaces the authorization endpoint.
	pub fn with_auth_uri(mut self, uri: impl Into<String>) -> Self {
		self.auth_uri = uri.into();

		self
	}

	/// Replaces the token endpoint.
	pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
		self.token_uri = uri.into();

		self
	}

	/// Replaces the revocation endpoint.
	pub fn with_revoke_uri(mut self, uri: impl Into<String>) -> Self {
		self.revoke_uri = uri.into();

		self
	}

	/// Replaces the token info endpoint.
	pub fn with_token_info_uri(mut self, uri: impl Into<String>) -> Self {
		self.token_info_uri = uri.into();

		self
	}
}
impl Default for ProviderEndpoints {
	fn default() -> Self {
		Self::google()
	}
}
