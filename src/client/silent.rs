//! Silent token acquisition: the cache-check/renew state machine guarded by
//! the renewal mutex.

// self
use crate::{
	_prelude::*,
	authorize::{self, AuthorizeParams, ResponseMode},
	cache::{CachedToken, DEFAULT_FRESHNESS_LEEWAY},
	client::{GetTokenOptions, SilentClient},
	error::{ConfigError, TimeoutStage},
	lock::{self, RENEWAL_LOCK_KEY},
	obs::{self, FlowKind},
	storage,
	transaction::Transaction,
	transport::{SessionRequest, SessionTokenResponse},
};

impl SilentClient {
	/// Returns a fresh token for the requested scope/audience, renewing it
	/// silently when the cache cannot serve the request.
	///
	/// The renewal mutex is acquired before the cache is even consulted and
	/// released unconditionally afterwards, so concurrent callers across every
	/// scheduler sharing the mutex serialize: the first waiter renews, later
	/// waiters find the record it cached.
	pub async fn get_token_silently(&self, options: GetTokenOptions) -> Result<CachedToken> {
		obs::observe(FlowKind::SilentToken, "get_token_silently", async move {
			self.mutex.acquire(RENEWAL_LOCK_KEY, lock::DEFAULT_ACQUIRE_TIMEOUT).await?;

			let outcome = self.get_token_under_lock(&options).await;
			let released = self.mutex.release(RENEWAL_LOCK_KEY).await;

			match (outcome, released) {
				(Err(e), _) => Err(e),
				(Ok(_), Err(e)) => Err(e),
				(Ok(token), Ok(())) => Ok(token),
			}
		})
		.await
	}

	/// Background freshness probe: a no-op when no session exists, otherwise a
	/// silent acquisition whose recoverable failures are swallowed so page
	/// initialization never breaks on them. The caller's next explicit
	/// operation surfaces the real state.
	pub async fn check_session(&self, options: GetTokenOptions) -> Result<()> {
		if !self.is_authenticated().await? {
			return Ok(());
		}

		match self.get_token_silently(options).await {
			Ok(_) => Ok(()),
			Err(e) if e.is_recoverable() => Ok(()),
			Err(e) => Err(e),
		}
	}

	async fn get_token_under_lock(&self, options: &GetTokenOptions) -> Result<CachedToken> {
		let scope = self.merged_scope(options.scope.as_deref());
		let audience = self.request_audience(options.audience.as_deref());

		if !options.ignore_cache {
			let query = self.cache_query(options.scope.as_deref(), options.audience.as_deref());

			// The freshness window is fixed; the configured leeway only feeds
			// ID token time-claim validation.
			if let Some(token) = self.cache.get(&query, DEFAULT_FRESHNESS_LEEWAY).await? {
				return Ok(token);
			}
		}

		let renewed = if self.use_refresh_tokens {
			self.refresh_grant(&scope, &audience, options).await
		} else {
			self.silent_authorization_grant(&scope, &audience, options).await
		};

		match renewed {
			Ok(token) => {
				self.save_token(&token).await?;

				Ok(token)
			},
			Err(e) if e.requires_login() => {
				// Cleanup so the caller's next is_authenticated-style check
				// reflects reality; the original failure always wins.
				self.cleanup_after_login_required().await;

				Err(e)
			},
			Err(e) => Err(e),
		}
	}

	/// Renewal via the refresh-token grant.
	///
	/// A client error while a session still exists means the refresh token was
	/// invalidated underneath a valid session, so the engine falls back to the
	/// silent authorization grant instead of failing outright.
	async fn refresh_grant(
		&self,
		scope: &str,
		audience: &str,
		options: &GetTokenOptions,
	) -> Result<CachedToken> {
		match self.transport.exchange(SessionRequest::refresh()).await {
			Ok(response) => self.token_from_response(response, None, scope, audience).await,
			Err(e) => {
				if !self.transport.session_exists().await? {
					return Err(Error::LoginRequired);
				}
				if e.is_client_error() {
					return self.silent_authorization_grant(scope, audience, options).await;
				}

				Err(e.into())
			},
		}
	}

	/// Renewal via a hidden `prompt=none` authorization round trip.
	async fn silent_authorization_grant(
		&self,
		scope: &str,
		audience: &str,
		options: &GetTokenOptions,
	) -> Result<CachedToken> {
		let redirect_uri = self.redirect_uri.clone().ok_or(ConfigError::MissingRedirectUri)?;
		let state = authorize::random_string();
		let nonce = authorize::random_string();
		let url = authorize::build_url(&self.authorize_endpoint, &AuthorizeParams {
			client_id: self.client_id.clone(),
			scope: scope.to_owned(),
			audience: audience.to_owned(),
			state: state.clone(),
			nonce: nonce.clone(),
			redirect_uri: redirect_uri.clone(),
			response_mode: ResponseMode::WebMessage,
			prompt_none: true,
			extra: [self.extra_authorize_params.clone(), options.extra_params.clone()].concat(),
		});

		self.transactions
			.create(&state, Transaction {
				nonce: nonce.clone(),
				app_state: None,
				scope: scope.to_owned(),
				audience: audience.to_owned(),
				redirect_uri: redirect_uri.clone(),
			})
			.await?;

		let timeout = options.authorize_timeout.unwrap_or(self.authorize_timeout);
		let payload =
			match tokio::time::timeout(lock::to_std(timeout), self.authorizer.authorize(url)).await
			{
				Ok(Ok(payload)) => payload,
				Ok(Err(e)) => {
					let _ = self.transactions.remove(&state).await;

					return Err(e);
				},
				Err(_) => {
					// Abandoned round trip; the pending authorization is dropped.
					let _ = self.transactions.remove(&state).await;

					return Err(Error::Timeout(TimeoutStage::SilentAuthorization));
				},
			};

		self.transactions.remove(&state).await?;

		if payload.state != state {
			return Err(Error::InvalidState);
		}

		match self
			.transport
			.exchange(SessionRequest::refresh_with_code(payload.code, redirect_uri))
			.await
		{
			Ok(response) =>
				self.token_from_response(response, Some(nonce), scope, audience).await,
			Err(e) => {
				if !self.transport.session_exists().await? {
					return Err(Error::LoginRequired);
				}

				Err(e.into())
			},
		}
	}

	async fn token_from_response(
		&self,
		response: SessionTokenResponse,
		nonce: Option<String>,
		scope: &str,
		audience: &str,
	) -> Result<CachedToken> {
		self.verify_token_response(response, nonce, scope.to_owned(), audience.to_owned()).await
	}

	/// Best-effort logout after a login-required failure: destroys the
	/// provider-side session when one still exists, then clears this client's
	/// cache records and the local authentication hint. Session existence is
	/// tracked by the transport, so clearing local state alone would leave the
	/// next session check reporting an authenticated user. Failures here are
	/// swallowed so the original error reaches the caller intact.
	async fn cleanup_after_login_required(&self) {
		let _ = self.destroy_session().await;
		let _ = self.cache.clear(&self.client_id).await;
		let _ = storage::clear_authentication_flag(self.store.as_ref()).await;
	}
}
