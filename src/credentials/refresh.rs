//! Refresh coordination between a credential, its provider, and its attached storage.

// self
use crate::{
	_prelude::*,
	auth::{OAuthErrorBody, TokenResponse},
	clock,
	credentials::{AccessTokenInfo, Credentials, error_context},
	http::HttpTransport,
	obs::{self, FlowKind},
	provider::ProviderErrorKind,
	store::{Storage, StorageGuard},
};

impl Credentials {
	/// Mints a new access token.
	///
	/// With storage attached, the whole refresh runs under the storage lock: a valid, unexpired
	/// token another holder already wrote is adopted without a network call, and the outcome of
	/// a network refresh is written back before the lock is released.
	///
	/// A provider rejection that the strategy classifies as permanent marks the credential
	/// invalid (and persists that) before the error is returned. Invalid credentials are never
	/// refreshed again.
	pub async fn refresh<T>(&self, transport: &T) -> Result<()>
	where
		T: ?Sized + HttpTransport,
	{
		obs::observe(FlowKind::Refresh, "refresh", self.refresh_locked(transport)).await
	}

	async fn refresh_locked<T>(&self, transport: &T) -> Result<()>
	where
		T: ?Sized + HttpTransport,
	{
		if self.invalid() {
			return Err(Error::InvalidCredential);
		}

		let Some(store) = self.store() else {
			return self.refresh_round_trip(transport, None).await;
		};
		let guard = store.acquire_lock().await?;
		let stored = store.locked_get(&guard).await?;

		if stored.is_some_and(|stored| self.adopt_stored(&stored)) {
			return Ok(());
		}

		self.refresh_round_trip(transport, Some((store.as_ref(), &guard))).await
	}

	/// Returns a usable access token, refreshing first when it is missing or expired.
	pub async fn get_access_token<T>(&self, transport: &T) -> Result<AccessTokenInfo>
	where
		T: ?Sized + HttpTransport,
	{
		if self.needs_refresh() {
			self.refresh(transport).await?;
		}

		let now = self.now();
		let state = self.state.read();
		let access_token = state.access_token.clone().ok_or(Error::UnrefreshableCredential)?;

		Ok(AccessTokenInfo {
			access_token,
			expires_in: state.token_expiry.map(|expiry| clock::expires_in(now, Some(expiry))),
		})
	}

	async fn refresh_round_trip<T>(
		&self,
		transport: &T,
		store: Option<(&dyn Storage, &StorageGuard)>,
	) -> Result<()>
	where
		T: ?Sized + HttpTransport,
	{
		let (grant_type, request) = self.refresh_request()?;
		let response = transport.perform(request).await?;
		let status = response.status();

		if status.is_success() {
			self.apply_token_response(TokenResponse::parse(response.body())?);

			if let Some((store, guard)) = store {
				store.locked_put(guard, self).await?;
			}

			return Ok(());
		}

		let body = OAuthErrorBody::parse(response.body());
		let ctx = error_context(status.as_u16(), Some(grant_type), &body, response.body());
		let message =
			body.message().unwrap_or_else(|| format!("Invalid response {}.", status.as_u16()));

		if self.strategy.classify_refresh_error(&ctx) == ProviderErrorKind::Invalid {
			self.state.write().invalid = true;

			if let Some((store, guard)) = store {
				store.locked_put(guard, self).await?;
			}
		}

		Err(Error::RefreshRejected { status: status.as_u16(), message })
	}

	/// Copies `stored` into this credential when it holds a different, still usable token.
	fn adopt_stored(&self, stored: &Credentials) -> bool {
		let candidate = stored.state.read().clone();
		let usable = !candidate.invalid
			&& candidate.access_token.is_some()
			&& !clock::is_expired(self.now(), candidate.token_expiry)
			&& candidate.access_token != self.access_token();

		if usable {
			*self.state.write() = candidate;
		}

		usable
	}

	pub(crate) fn apply_token_response(&self, token: TokenResponse) {
		let now = self.now();
		let mut state = self.state.write();

		state.access_token = Some(token.access_token);

		if let Some(refresh_token) = token.refresh_token {
			state.refresh_token = Some(refresh_token);
		}

		state.token_expiry =
			token.expires_in.and_then(|secs| clock::expiry_from_lifetime(now, secs));

		if token.id_token.is_some() {
			state.id_token = token.id_token;
		}

		state.token_response = Some(token.raw);
	}
}
