//! Three-legged authorization code flow for web and installed applications.

// std
use std::collections::BTreeMap;
// crates.io
use http::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::{OAuthErrorBody, ScopeSet, TokenResponse, parse_body},
	clock::{Clock, SystemClock},
	credentials::{Credentials, CredentialsBuilder},
	error::ConfigError,
	flows::PkcePair,
	http::{HttpTransport, form_post, header_pair, update_query_params},
	obs::{self, FlowKind},
	provider::{
		DefaultProviderStrategy, GrantType, ProviderEndpoints, ProviderStrategy, RetryPolicy,
	},
};

/// Redirect URI understood by Google as "return the code to the calling page".
pub const POSTMESSAGE_REDIRECT_URI: &str = "postmessage";

const NO_CODE_MESSAGE: &str = "No code was supplied in the query parameters.";

/// What the authorization server sent back to the redirect URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeInput {
	/// The authorization code to exchange.
	Code(String),
	/// The `error` the server reported instead of a code.
	Error(String),
}
impl ExchangeInput {
	/// Extracts the outcome from a redirect query string such as `code=abc&state=xyz`.
	///
	/// A query carrying neither `code` nor `error` yields an error describing the missing code.
	pub fn from_query(query: &str) -> Self {
		let pairs = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
			.into_owned()
			.collect::<BTreeMap<_, _>>();

		if let Some(code) = pairs.get("code") {
			Self::Code(code.to_owned())
		} else {
			Self::Error(pairs.get("error").map_or_else(|| NO_CODE_MESSAGE.to_owned(), Clone::clone))
		}
	}
}
impl From<&str> for ExchangeInput {
	fn from(code: &str) -> Self {
		Self::Code(code.to_owned())
	}
}

/// Consent URL builder and code exchanger for one OAuth client.
pub struct OAuth2WebServerFlow {
	client_id: String,
	client_secret: Option<String>,
	scope: ScopeSet,
	redirect_uri: Option<String>,
	user_agent: Option<String>,
	endpoints: ProviderEndpoints,
	login_hint: Option<String>,
	authorization_header: Option<String>,
	params: BTreeMap<String, String>,
	pkce: Option<Option<PkcePair>>,
	retry_policy: RetryPolicy,
	strategy: Arc<dyn ProviderStrategy>,
	clock: Arc<dyn Clock>,
}
impl OAuth2WebServerFlow {
	/// Creates a flow for `client_id` requesting `scope`, using Google's endpoints.
	///
	/// The consent URL asks for offline access and a `code` response unless overridden with
	/// [`with_param`](Self::with_param).
	pub fn new(client_id: impl Into<String>, scope: ScopeSet) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			scope,
			redirect_uri: None,
			user_agent: None,
			endpoints: ProviderEndpoints::google(),
			login_hint: None,
			authorization_header: None,
			params: BTreeMap::from([
				("access_type".to_owned(), "offline".to_owned()),
				("response_type".to_owned(), "code".to_owned()),
			]),
			pkce: None,
			retry_policy: RetryPolicy::default(),
			strategy: Arc::new(DefaultProviderStrategy),
			clock: Arc::new(SystemClock),
		}
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the redirect URI.
	pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(uri.into());

		self
	}

	/// Sets the user agent sent on the code exchange and inherited by issued credentials.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Replaces the provider endpoints.
	pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Pre-selects an account on the consent screen.
	pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
		self.login_hint = Some(hint.into());

		self
	}

	/// Authenticates the code exchange with this `Authorization` header instead of the secret.
	pub fn with_authorization_header(mut self, value: impl Into<String>) -> Self {
		self.authorization_header = Some(value.into());

		self
	}

	/// Adds or overrides a consent URL parameter.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.insert(key.into(), value.into());

		self
	}

	/// Enables PKCE with a verifier generated when the consent URL is built.
	pub fn with_pkce(mut self) -> Self {
		self.pkce = Some(None);

		self
	}

	/// Enables PKCE with a caller-supplied verifier.
	pub fn with_code_verifier(mut self, verifier: impl Into<String>) -> Self {
		self.pkce = Some(Some(PkcePair::from_verifier(verifier)));

		self
	}

	/// Replaces the retry policy inherited by issued credentials.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Replaces the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Replaces the time source inherited by issued credentials.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Configured redirect URI.
	pub fn redirect_uri(&self) -> Option<&str> {
		self.redirect_uri.as_deref()
	}

	/// PKCE material in use, once generated.
	pub fn pkce(&self) -> Option<&PkcePair> {
		self.pkce.as_ref().and_then(Option::as_ref)
	}

	/// Builds the consent URL the end user should visit.
	///
	/// A `redirect_uri` passed here replaces the configured one for the rest of the flow.
	pub fn step1_get_authorize_url(
		&mut self,
		redirect_uri: Option<&str>,
		state: Option<&str>,
	) -> Result<String> {
		if let Some(uri) = redirect_uri {
			self.redirect_uri = Some(uri.to_owned());
		}

		let redirect_uri = self.redirect_uri.clone().ok_or(ConfigError::MissingRedirectUri)?;
		let mut query = BTreeMap::from([
			("client_id".to_owned(), self.client_id.clone()),
			("redirect_uri".to_owned(), redirect_uri),
			("scope".to_owned(), self.scope.normalized()),
		]);

		if let Some(state) = state {
			query.insert("state".into(), state.to_owned());
		}
		if let Some(hint) = &self.login_hint {
			query.insert("login_hint".into(), hint.to_owned());
		}
		if let Some(slot) = &mut self.pkce {
			let pair = slot.get_or_insert_with(PkcePair::generate);

			query.insert("code_challenge".into(), pair.challenge().to_owned());
			query.insert("code_challenge_method".into(), pair.method().as_str().to_owned());
		}

		query.extend(self.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));

		let pairs = query.into_iter().collect::<Vec<_>>();

		Ok(update_query_params(&self.endpoints.auth_uri, &pairs))
	}

	/// Exchanges the authorization code for credentials.
	pub async fn step2_exchange<T>(
		&self,
		input: ExchangeInput,
		transport: &T,
	) -> Result<Credentials>
	where
		T: ?Sized + HttpTransport,
	{
		let exchange = self.exchange(input, transport);

		obs::observe(FlowKind::CodeExchange, "step2_exchange", exchange).await
	}

	async fn exchange<T>(&self, input: ExchangeInput, transport: &T) -> Result<Credentials>
	where
		T: ?Sized + HttpTransport,
	{
		let code = match input {
			ExchangeInput::Code(code) => code,
			ExchangeInput::Error(message) => return Err(Error::FlowExchange { message }),
		};
		let mut request = form_post(
			&self.endpoints.token_uri,
			&self.exchange_form(code),
			self.user_agent.as_deref(),
		)?;

		if let Some(value) = &self.authorization_header {
			let (name, value) = header_pair(AUTHORIZATION.as_str(), value)?;

			request.headers_mut().insert(name, value);
		}

		let response = transport.perform(request).await?;
		let status = response.status();
		let body = parse_body(response.body());

		if status.is_success() && body.contains_key("access_token") {
			let token = TokenResponse::from_map(body)?;
			let credentials = self.credentials_builder().build();

			credentials.apply_token_response(token);

			return Ok(credentials);
		}

		let message = OAuthErrorBody::parse(response.body())
			.message()
			.unwrap_or_else(|| format!("Invalid response: {}.", status.as_u16()));

		Err(Error::FlowExchange { message })
	}

	fn exchange_form(&self, code: String) -> Vec<(String, String)> {
		let mut form = BTreeMap::from([
			("grant_type".to_owned(), GrantType::AuthorizationCode.as_str().to_owned()),
			("client_id".to_owned(), self.client_id.clone()),
			("code".to_owned(), code),
			("scope".to_owned(), self.scope.normalized()),
		]);

		if let Some(uri) = &self.redirect_uri {
			form.insert("redirect_uri".into(), uri.to_owned());
		}
		if let (Some(secret), None) = (&self.client_secret, &self.authorization_header) {
			form.insert("client_secret".into(), secret.to_owned());
		}
		if let Some(pair) = self.pkce() {
			form.insert("code_verifier".into(), pair.verifier().to_owned());
		}

		self.strategy.augment_token_request(GrantType::AuthorizationCode, &mut form);

		form.into_iter().collect()
	}

	fn credentials_builder(&self) -> CredentialsBuilder {
		let builder =
			Credentials::refresh_token_grant(&self.client_id, self.client_secret.as_deref());
		let builder = builder
			.scopes(self.scope.clone())
			.endpoints(self.endpoints.clone())
			.retry_policy(self.retry_policy.clone())
			.strategy(self.strategy.clone())
			.clock(self.clock.clone());

		match &self.user_agent {
			Some(user_agent) => builder.user_agent(user_agent),
			None => builder,
		}
	}
}
impl Debug for OAuth2WebServerFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2WebServerFlow")
			.field("client_id", &self.client_id)
			.field("scope", &self.scope)
			.field("redirect_uri", &self.redirect_uri)
			.field("endpoints", &self.endpoints)
			.field("pkce", &self.pkce.is_some())
			.finish()
	}
}

/// Exchanges an authorization code obtained by a browser-side client for credentials.
///
/// Uses the [`POSTMESSAGE_REDIRECT_URI`] redirect and Google's endpoints.
pub async fn credentials_from_code<T>(
	client_id: &str,
	client_secret: Option<&str>,
	scope: ScopeSet,
	code: &str,
	transport: &T,
) -> Result<Credentials>
where
	T: ?Sized + HttpTransport,
{
	let mut flow = OAuth2WebServerFlow::new(client_id, scope)
		.with_redirect_uri(POSTMESSAGE_REDIRECT_URI);

	if let Some(secret) = client_secret {
		flow = flow.with_client_secret(secret);
	}

	flow.step2_exchange(ExchangeInput::from(code), transport).await
}
