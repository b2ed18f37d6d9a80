//! Credentials: token state, expiry, refresh, revoke, and persistence hooks.
//!
//! One concrete [`Credentials`] type covers every variant. What differs between a user's
//! refresh-token credential, a service account, a bare access token, and a metadata-server
//! credential is the [`RefreshGrant`] it carries, which decides how a new access token is minted.
//!
//! Token state sits behind a short-lived lock that is never held across an `.await`. Two
//! concurrent refreshes of the same instance may both reach the provider; the attached
//! [`Storage`](crate::store::Storage) lock is what keeps persisted state consistent.

pub mod authorized;
pub mod grant;
pub mod record;
pub mod refresh;
pub mod revoke;
pub mod service_account;
pub mod token_info;

pub use authorized::*;
pub use grant::*;
pub use service_account::*;

// std
use std::sync::Weak;
// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{OAuthErrorBody, ScopeSet, TokenSecret},
	clock::{self, Clock, SystemClock},
	http::HttpTransport,
	provider::{
		DefaultProviderStrategy, GrantType, ProviderEndpoints, ProviderErrorContext,
		ProviderStrategy, RetryPolicy,
	},
	store::Storage,
};

/// Lifecycle state derived from the token and the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialStatus {
	/// An access token is present and not expired.
	Fresh,
	/// The access token is missing or expired; a refresh is needed before use.
	Stale,
	/// Revoked or permanently rejected by the provider.
	Invalid,
}

/// Access token plus its remaining lifetime, as returned by
/// [`Credentials::get_access_token`].
#[derive(Clone, Debug)]
pub struct AccessTokenInfo {
	/// Current access token.
	pub access_token: TokenSecret,
	/// Remaining lifetime, or `None` when the token has no known expiry.
	pub expires_in: Option<Duration>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TokenState {
	pub(crate) access_token: Option<TokenSecret>,
	pub(crate) refresh_token: Option<TokenSecret>,
	pub(crate) token_expiry: Option<OffsetDateTime>,
	pub(crate) invalid: bool,
	pub(crate) scopes: ScopeSet,
	pub(crate) token_response: Option<Map<String, Value>>,
	pub(crate) id_token: Option<Value>,
}

/// OAuth 2.0 credential with its refresh capability.
///
/// Share it as `Arc<Credentials>`; every operation takes `&self`.
pub struct Credentials {
	grant: RefreshGrant,
	endpoints: ProviderEndpoints,
	user_agent: Option<String>,
	retry_policy: RetryPolicy,
	strategy: Arc<dyn ProviderStrategy>,
	clock: Arc<dyn Clock>,
	state: RwLock<TokenState>,
	store: RwLock<Option<Weak<dyn Storage>>>,
}
impl Credentials {
	/// Starts building credentials around an explicit grant.
	pub fn builder(grant: RefreshGrant) -> CredentialsBuilder {
		CredentialsBuilder::new(grant)
	}

	/// Refresh-token credentials for an installed or web application.
	pub fn refresh_token_grant(
		client_id: impl Into<String>,
		client_secret: Option<&str>,
	) -> CredentialsBuilder {
		Self::builder(RefreshGrant::RefreshToken {
			client_id: client_id.into(),
			client_secret: client_secret.map(ToOwned::to_owned),
		})
	}

	/// Non-refreshable credentials wrapping an access token obtained elsewhere.
	pub fn access_token_only(
		access_token: impl Into<String>,
		user_agent: Option<&str>,
	) -> CredentialsBuilder {
		let builder = Self::builder(RefreshGrant::BearerOnly).access_token(access_token);

		match user_agent {
			Some(user_agent) => builder.user_agent(user_agent),
			None => builder,
		}
	}

	/// Service-account credentials signing JWT-bearer assertions with the account's key.
	pub fn service_account(key: ServiceAccountKey) -> CredentialsBuilder {
		let token_uri = key.token_uri.clone();
		let builder = Self::builder(RefreshGrant::Assertion {
			assertion_type: None,
			source: AssertionSource::ServiceAccount(key),
		});

		match token_uri {
			Some(uri) => builder.token_uri(uri),
			None => builder,
		}
	}

	/// Assertion credentials backed by a caller-supplied signer.
	pub fn assertion(
		signer: Arc<dyn AssertionSigner>,
		assertion_type: Option<&str>,
	) -> CredentialsBuilder {
		Self::builder(RefreshGrant::Assertion {
			assertion_type: assertion_type.map(ToOwned::to_owned),
			source: AssertionSource::Signer(signer),
		})
	}

	/// Credentials fetched from the compute metadata server of a hosted runtime.
	pub fn metadata_server() -> CredentialsBuilder {
		Self::builder(RefreshGrant::MetadataServer)
			.token_uri(crate::provider::METADATA_TOKEN_URI)
	}

	/// Grant used to mint new access tokens.
	pub fn grant(&self) -> &RefreshGrant {
		&self.grant
	}

	/// Endpoints this credential talks to.
	pub fn endpoints(&self) -> &ProviderEndpoints {
		&self.endpoints
	}

	/// User agent prefixed to outbound requests.
	pub fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref()
	}

	/// Statuses that trigger a refresh-and-retry in authorized requests.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry_policy
	}

	/// Current access token.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.state.read().access_token.clone()
	}

	/// Current refresh token.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.state.read().refresh_token.clone()
	}

	/// Absolute expiry of the access token, if known.
	pub fn token_expiry(&self) -> Option<OffsetDateTime> {
		self.state.read().token_expiry
	}

	/// Returns true once revoked or permanently rejected.
	pub fn invalid(&self) -> bool {
		self.state.read().invalid
	}

	/// Granted scopes; empty means unknown.
	pub fn scopes(&self) -> ScopeSet {
		self.state.read().scopes.clone()
	}

	/// Raw body of the last token response.
	pub fn token_response(&self) -> Option<Map<String, Value>> {
		self.state.read().token_response.clone()
	}

	/// Decoded claims of the last ID token.
	pub fn id_token(&self) -> Option<Value> {
		self.state.read().id_token.clone()
	}

	/// Returns true when the credential is invalid or its expiry has passed.
	///
	/// A missing access token alone does not count as expired.
	pub fn access_token_expired(&self) -> bool {
		let state = self.state.read();

		state.invalid
			|| (state.token_expiry.is_some()
				&& clock::is_expired(self.clock.now(), state.token_expiry))
	}

	/// Remaining lifetime of the access token; [`Duration::MAX`] when no expiry is known.
	pub fn expires_in(&self) -> Duration {
		clock::expires_in(self.clock.now(), self.token_expiry())
	}

	/// Lifecycle state at the current instant.
	pub fn status(&self) -> CredentialStatus {
		if self.invalid() {
			CredentialStatus::Invalid
		} else if self.needs_refresh() {
			CredentialStatus::Stale
		} else {
			CredentialStatus::Fresh
		}
	}

	/// Attaches `store`; it is read before and written after every refresh and revoke.
	///
	/// Only a weak handle is kept, so the storage owner controls its lifetime.
	pub fn set_store(&self, store: &Arc<dyn Storage>) {
		*self.store.write() = Some(Arc::downgrade(store));
	}

	/// Detaches any storage.
	pub fn clear_store(&self) {
		self.store.write().take();
	}

	/// Attached storage, if it is still alive.
	pub fn store(&self) -> Option<Arc<dyn Storage>> {
		self.store.read().as_ref().and_then(Weak::upgrade)
	}

	/// Returns true when every scope in `scopes` was granted.
	///
	/// Accepts individual scopes; use [`ScopeSet::from_space_delimited`] for a scope string.
	pub fn has_scopes<I, S>(&self, scopes: I) -> bool
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.state.read().scopes.is_superset(scopes)
	}

	/// Returns true when the credential must be scoped with [`create_scoped`] before use.
	///
	/// [`create_scoped`]: Self::create_scoped
	pub fn create_scoped_required(&self) -> bool {
		matches!(self.grant, RefreshGrant::Assertion { .. }) && self.state.read().scopes.is_empty()
	}

	/// Returns a credential limited to `scopes`.
	///
	/// Assertion credentials put the scopes in every assertion, so they get a fresh, unfetched
	/// copy. Every other variant is returned unchanged.
	pub fn create_scoped(self: &Arc<Self>, scopes: ScopeSet) -> Arc<Self> {
		if !matches!(self.grant, RefreshGrant::Assertion { .. }) {
			return self.clone();
		}

		Arc::new(Self {
			grant: self.grant.clone(),
			endpoints: self.endpoints.clone(),
			user_agent: self.user_agent.clone(),
			retry_policy: self.retry_policy.clone(),
			strategy: self.strategy.clone(),
			clock: self.clock.clone(),
			state: RwLock::new(TokenState { scopes, ..Default::default() }),
			store: RwLock::new(None),
		})
	}

	/// Wraps `transport` so every request carries this credential's bearer token.
	pub fn authorize<T>(self: &Arc<Self>, transport: T) -> AuthorizedHttpClient<T>
	where
		T: HttpTransport,
	{
		AuthorizedHttpClient::new(self.clone(), transport)
	}

	pub(crate) fn needs_refresh(&self) -> bool {
		self.access_token().is_none() || self.access_token_expired()
	}

	pub(crate) fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("Credentials")
			.field("grant", &self.grant)
			.field("endpoints", &self.endpoints)
			.field("user_agent", &self.user_agent)
			.field("access_token", &state.access_token)
			.field("refresh_token", &state.refresh_token)
			.field("token_expiry", &state.token_expiry)
			.field("invalid", &state.invalid)
			.field("scopes", &state.scopes)
			.finish()
	}
}

/// Builder for [`Credentials`].
pub struct CredentialsBuilder {
	grant: RefreshGrant,
	endpoints: ProviderEndpoints,
	user_agent: Option<String>,
	retry_policy: RetryPolicy,
	strategy: Arc<dyn ProviderStrategy>,
	clock: Arc<dyn Clock>,
	state: TokenState,
}
impl CredentialsBuilder {
	fn new(grant: RefreshGrant) -> Self {
		Self {
			grant,
			endpoints: ProviderEndpoints::google(),
			user_agent: None,
			retry_policy: RetryPolicy::default(),
			strategy: Arc::new(DefaultProviderStrategy),
			clock: Arc::new(SystemClock),
			state: TokenState::default(),
		}
	}

	/// Seeds the access token.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.state.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Seeds the refresh token.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.state.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Seeds the access token expiry.
	pub fn token_expiry(mut self, expiry: OffsetDateTime) -> Self {
		self.state.token_expiry = Some(expiry);

		self
	}

	/// Sets the granted (or, for assertions, requested) scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.state.scopes = scopes;

		self
	}

	/// Seeds decoded ID token claims.
	pub fn id_token(mut self, claims: Value) -> Self {
		self.state.id_token = Some(claims);

		self
	}

	/// Seeds the raw last token response.
	pub fn token_response(mut self, response: Map<String, Value>) -> Self {
		self.state.token_response = Some(response);

		self
	}

	/// Marks the credential invalid from the start.
	pub fn invalid(mut self, invalid: bool) -> Self {
		self.state.invalid = invalid;

		self
	}

	/// Sets the user agent.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Replaces every endpoint.
	pub fn endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Replaces the token endpoint.
	pub fn token_uri(mut self, uri: impl Into<String>) -> Self {
		self.endpoints.token_uri = uri.into();

		self
	}

	/// Replaces the revocation endpoint.
	pub fn revoke_uri(mut self, uri: impl Into<String>) -> Self {
		self.endpoints.revoke_uri = uri.into();

		self
	}

	/// Replaces the token info endpoint.
	pub fn token_info_uri(mut self, uri: impl Into<String>) -> Self {
		self.endpoints.token_info_uri = uri.into();

		self
	}

	/// Replaces the refresh-and-retry status policy.
	pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Replaces the provider strategy.
	pub fn strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Replaces the time source.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Finishes the credential.
	pub fn build(self) -> Credentials {
		Credentials {
			grant: self.grant,
			endpoints: self.endpoints,
			user_agent: self.user_agent,
			retry_policy: self.retry_policy,
			strategy: self.strategy,
			clock: self.clock,
			state: RwLock::new(self.state),
			store: RwLock::new(None),
		}
	}
}

pub(crate) fn error_context(
	status: u16,
	grant_type: Option<GrantType>,
	body: &OAuthErrorBody,
	raw: &[u8],
) -> ProviderErrorContext {
	let mut ctx = ProviderErrorContext::new(status);

	if let Some(grant_type) = grant_type {
		ctx = ctx.with_grant_type(grant_type);
	}
	if let Some(error) = &body.error {
		ctx = ctx.with_oauth_error(error.as_str());
	}
	if let Some(description) = &body.error_description {
		ctx = ctx.with_error_description(description.as_str());
	}
	if !raw.is_empty() {
		ctx = ctx.with_body_preview(String::from_utf8_lossy(raw));
	}

	ctx
}
