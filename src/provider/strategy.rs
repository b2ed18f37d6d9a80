//! Provider strategy hooks that customize token requests and error handling.
//!
//! Implementations decorate outgoing token requests and decide how provider errors affect a
//! credential, without tying credentials to any particular HTTP client.

// std
use std::collections::BTreeMap;
// self
use crate::_prelude::*;

/// Grant types a credential or flow can send to a token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code exchange.
	AuthorizationCode,
	/// Refresh Token grant.
	RefreshToken,
	/// JWT-bearer assertion grant (RFC 7523).
	JwtBearer,
	/// Token fetched from a compute metadata server.
	MetadataServer,
}
impl GrantType {
	/// Returns the `grant_type` form value, or a label for grants that send none.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::JwtBearer => "urn:ietf:params:oauth:grant-type:jwt-bearer",
			GrantType::MetadataServer => "metadata_server",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Implementors are required to be `Send + Sync`, and the hooks use crate-owned data types so
/// downstream crates never depend on transport-specific structures. Every hook has a default.
pub trait ProviderStrategy: Send + Sync {
	/// Decides whether a failed refresh permanently invalidates the credential.
	fn classify_refresh_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		classify_refresh(ctx)
	}

	/// Returns true when a failed revoke means the token was already unusable.
	///
	/// Such failures are treated as a successful revoke. The default recognizes the
	/// `invalid_token` OAuth error.
	fn revoke_reports_already_invalid(&self, ctx: &ProviderErrorContext) -> bool {
		ctx.oauth_error.as_deref().is_some_and(|error| error.eq_ignore_ascii_case("invalid_token"))
	}

	/// Gives providers a chance to add custom form parameters before dispatching.
	///
	/// The default implementation does nothing, which is enough for most providers.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The provider will never accept this credential again.
	Invalid,
	/// Failure is temporary; the credential stays usable.
	Transient,
}

/// Context passed to provider strategies when classifying errors.
///
/// The struct keeps only primitive data (status codes, OAuth fields, body preview) so
/// strategies stay decoupled from any HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request, when it was a token request.
	pub grant_type: Option<GrantType>,
	/// HTTP status code returned by the provider.
	pub http_status: u16,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context for a response with the given status.
	pub fn new(http_status: u16) -> Self {
		Self {
			grant_type: None,
			http_status,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Tags the context with the grant that was attempted.
	pub fn with_grant_type(mut self, grant_type: GrantType) -> Self {
		self.grant_type = Some(grant_type);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview, truncated to a fixed number of characters.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy.
///
/// A refresh failure carrying an OAuth `error` field invalidates the credential unless the
/// provider flagged it as temporary. Failures without an `error` field (proxies, outages) are
/// transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {}

fn classify_refresh(ctx: &ProviderErrorContext) -> ProviderErrorKind {
	match ctx.oauth_error.as_deref() {
		Some(error)
			if error.eq_ignore_ascii_case("temporarily_unavailable")
				|| error.eq_ignore_ascii_case("server_error") =>
			ProviderErrorKind::Transient,
		Some(_) => ProviderErrorKind::Invalid,
		None => ProviderErrorKind::Transient,
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= ProviderErrorContext::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_errors_invalidate_unless_temporary() {
		let strategy = DefaultProviderStrategy;
		let rejected = ProviderErrorContext::new(400)
			.with_grant_type(GrantType::RefreshToken)
			.with_oauth_error("invalid_grant");
		let busy = ProviderErrorContext::new(503).with_oauth_error("temporarily_unavailable");
		let bare = ProviderErrorContext::new(500).with_body_preview("<html>oops</html>");

		assert_eq!(strategy.classify_refresh_error(&rejected), ProviderErrorKind::Invalid);
		assert_eq!(strategy.classify_refresh_error(&busy), ProviderErrorKind::Transient);
		assert_eq!(strategy.classify_refresh_error(&bare), ProviderErrorKind::Transient);
	}

	#[test]
	fn revoke_already_invalid_needs_invalid_token() {
		let strategy = DefaultProviderStrategy;

		assert!(strategy.revoke_reports_already_invalid(
			&ProviderErrorContext::new(400).with_oauth_error("invalid_token")
		));
		assert!(!strategy.revoke_reports_already_invalid(
			&ProviderErrorContext::new(400).with_oauth_error("invalid_request")
		));
		assert!(!strategy.revoke_reports_already_invalid(&ProviderErrorContext::new(500)));
	}

	#[test]
	fn body_preview_is_truncated() {
		let ctx = ProviderErrorContext::new(502).with_body_preview("x".repeat(300));
		let preview = ctx.body_preview.expect("Preview should be kept.");

		assert_eq!(preview.chars().count(), ProviderErrorContext::BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}

	#[test]
	fn grant_labels_match_form_values() {
		assert_eq!(GrantType::JwtBearer.as_str(), "urn:ietf:params:oauth:grant-type:jwt-bearer");
		assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
	}
}
