//! Interactive login flow: authorize URL construction and the redirect
//! callback that exchanges the returned code.

// self
use crate::{
	_prelude::*,
	authorize::{self, AuthorizeParams, ResponseMode},
	client::{RedirectLoginOptions, SilentClient},
	error::ConfigError,
	obs::{self, FlowKind},
	transaction::Transaction,
	transport::SessionRequest,
};

impl SilentClient {
	/// Builds the authorize URL for an interactive login and registers the
	/// in-flight transaction. The caller navigates to the returned URL; the
	/// engine never does.
	pub async fn build_authorize_url(&self, options: RedirectLoginOptions) -> Result<Url> {
		obs::observe(FlowKind::Authorize, "build_authorize_url", async move {
			let redirect_uri = options
				.redirect_uri
				.or_else(|| self.redirect_uri.clone())
				.ok_or(ConfigError::MissingRedirectUri)?;
			let state = authorize::random_string();
			let nonce = authorize::random_string();
			let scope = self.merged_scope(options.scope.as_deref());
			let audience = self.request_audience(options.audience.as_deref());
			let url = authorize::build_url(&self.authorize_endpoint, &AuthorizeParams {
				client_id: self.client_id.clone(),
				scope: scope.clone(),
				audience: audience.clone(),
				state: state.clone(),
				nonce: nonce.clone(),
				redirect_uri: redirect_uri.clone(),
				response_mode: ResponseMode::Query,
				prompt_none: false,
				extra: [self.extra_authorize_params.clone(), options.extra_params].concat(),
			});

			// The transaction must be durable before the URL escapes, since
			// the redirect leaves the page.
			self.transactions
				.create(&state, Transaction {
					nonce,
					app_state: options.app_state,
					scope,
					audience,
					redirect_uri,
				})
				.await?;

			Ok(url)
		})
		.await
	}

	/// Handles the redirect back from the provider: consumes the transaction,
	/// exchanges the code, verifies and caches the token, and returns the
	/// application state recorded at login time.
	///
	/// The transaction is single-use on every path, so replaying the same
	/// callback URL fails with [`Error::InvalidState`].
	pub async fn handle_redirect_callback(&self, url: &Url) -> Result<Option<JsonValue>> {
		obs::observe(
			FlowKind::Callback,
			"handle_redirect_callback",
			self.handle_redirect_callback_inner(url),
		)
		.await
	}

	async fn handle_redirect_callback_inner(&self, url: &Url) -> Result<Option<JsonValue>> {
		if url.query().is_none_or(str::is_empty) {
			return Err(Error::MissingQueryParams);
		}

		let mut state = None;
		let mut code = None;
		let mut error = None;
		let mut error_description = None;

		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				"state" => state = Some(value.into_owned()),
				"code" => code = Some(value.into_owned()),
				"error" => error = Some(value.into_owned()),
				"error_description" => error_description = Some(value.into_owned()),
				_ => (),
			}
		}

		let state = state.ok_or(Error::InvalidState)?;
		let Some(transaction) = self.transactions.get(&state).await? else {
			// Unknown state: forged, replayed, or already consumed.
			return Err(Error::InvalidState);
		};

		self.transactions.remove(&state).await?;

		if let Some(error) = error {
			return Err(Error::Authentication {
				error,
				description: error_description.unwrap_or_default(),
				state,
				app_state: transaction.app_state,
			});
		}

		let code = code.ok_or(Error::MissingAuthorizationCode)?;
		let response = self
			.transport
			.exchange(SessionRequest::login(code, transaction.redirect_uri))
			.await?;
		let token = self
			.verify_token_response(
				response,
				Some(transaction.nonce),
				transaction.scope,
				transaction.audience,
			)
			.await?;

		self.save_token(&token).await?;

		Ok(transaction.app_state)
	}
}
