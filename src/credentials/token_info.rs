//! Granted-scope lookup through the token info endpoint.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, parse_body},
	credentials::Credentials,
	http::{self, HttpTransport},
	obs::{self, FlowKind},
};

impl Credentials {
	/// Asks the token info endpoint which scopes the access token carries.
	///
	/// Refreshes first when the token is missing or expired. On success the result replaces the
	/// credential's scopes.
	pub async fn retrieve_scopes<T>(&self, transport: &T) -> Result<ScopeSet>
	where
		T: ?Sized + HttpTransport,
	{
		obs::observe(FlowKind::TokenInfo, "retrieve_scopes", self.lookup_scopes(transport)).await
	}

	async fn lookup_scopes<T>(&self, transport: &T) -> Result<ScopeSet>
	where
		T: ?Sized + HttpTransport,
	{
		if self.needs_refresh() {
			self.refresh(transport).await?;
		}

		let token = self.access_token().ok_or(Error::UnrefreshableCredential)?;
		let uri = http::update_query_params(
			&self.endpoints().token_info_uri,
			&[("access_token", token.expose())],
		);
		let response = transport.perform(http::get(&uri, &[])?).await?;
		let status = response.status().as_u16();
		let body = parse_body(response.body());

		if !response.status().is_success() {
			let message = body
				.get("error_description")
				.and_then(Value::as_str)
				.map(ToOwned::to_owned)
				.unwrap_or_else(|| format!("Invalid response {status}."));

			return Err(Error::TokenInfo { status, message });
		}

		let scopes = ScopeSet::from_space_delimited(
			body.get("scope").and_then(Value::as_str).unwrap_or_default(),
		);

		self.state.write().scopes = scopes.clone();

		Ok(scopes)
	}
}
