//! Token acquisition engine.
//!
//! [`SilentClient`] composes the durable store, token cache, renewal mutex,
//! session transport, ID token verifier, and silent authorizer into the token
//! lifecycle state machine: login URL construction, redirect callback
//! handling, silent token acquisition, and logout. Every collaborator is an
//! injected trait object, so tests substitute fakes and multiple clients in
//! one process never share a lock unless they deliberately share a mutex.

mod callback;
mod logout;
mod options;
mod silent;

pub use options::*;

// std
use std::borrow::Cow;
// self
use crate::{
	_prelude::*,
	auth::{self, IdTokenClaims},
	authorize::SilentAuthorizer,
	cache::{
		CacheLocation, CacheQuery, CachedToken, MemoryTokenCache, PersistentTokenCache, TokenCache,
	},
	error::ConfigError,
	lock::{LocalRenewalMutex, RenewalMutex},
	storage::{self, KeyValueStore, MemoryKeyValueStore},
	transaction::TransactionStore,
	transport::{SessionTokenResponse, SessionTransport},
	verify::{IdTokenExpectations, IdTokenVerifier},
};

/// The token acquisition engine.
///
/// Construct through [`SilentClient::builder`]; all flows live on the
/// resulting instance. The engine never navigates anywhere itself: flows that
/// end in a browser navigation return the [`Url`] for the caller to follow.
pub struct SilentClient {
	client_id: String,
	issuer: String,
	audience: String,
	scope: String,
	redirect_uri: Option<Url>,
	authorize_endpoint: Url,
	logout_endpoint: Url,
	use_refresh_tokens: bool,
	leeway: Duration,
	authorize_timeout: Duration,
	extra_authorize_params: Vec<(String, String)>,
	store: Arc<dyn KeyValueStore>,
	cache: Arc<dyn TokenCache>,
	mutex: Arc<dyn RenewalMutex>,
	transport: Arc<dyn SessionTransport>,
	verifier: Arc<dyn IdTokenVerifier>,
	authorizer: Arc<dyn SilentAuthorizer>,
	transactions: TransactionStore,
}
impl SilentClient {
	/// Starts building a client from the provided options.
	pub fn builder(options: ClientOptions) -> SilentClientBuilder {
		SilentClientBuilder {
			options,
			store: None,
			cache: None,
			mutex: None,
			transport: None,
			verifier: None,
			authorizer: None,
		}
	}

	/// Delegates entirely to the session transport's session-existence check;
	/// never derived from the token cache, which can be empty while a session
	/// is still valid.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.transport.session_exists().await?)
	}

	/// Returns the cached user profile for the given scope/audience, or `None`
	/// when unauthenticated or nothing usable is cached.
	pub async fn get_user(
		&self,
		options: &GetTokenOptions,
	) -> Result<Option<JsonMap<String, JsonValue>>> {
		Ok(self.peek_cached(options).await?.map(|token| token.decoded.user))
	}

	/// Returns the cached, verified ID token claims for the given
	/// scope/audience, or `None` when unauthenticated or nothing is cached.
	pub async fn get_id_token_claims(
		&self,
		options: &GetTokenOptions,
	) -> Result<Option<IdTokenClaims>> {
		Ok(self.peek_cached(options).await?.map(|token| token.decoded.claims))
	}

	async fn peek_cached(&self, options: &GetTokenOptions) -> Result<Option<CachedToken>> {
		if !self.is_authenticated().await? {
			return Ok(None);
		}

		let query = self.cache_query(options.scope.as_deref(), options.audience.as_deref());

		Ok(self.cache.get(&query, Duration::ZERO).await?)
	}

	fn merged_scope(&self, per_call: Option<&str>) -> String {
		auth::scope::merge([Some(self.scope.as_str()), per_call])
	}

	fn request_audience(&self, per_call: Option<&str>) -> String {
		per_call.unwrap_or(&self.audience).to_owned()
	}

	fn cache_query(&self, scope: Option<&str>, audience: Option<&str>) -> CacheQuery {
		CacheQuery {
			client_id: self.client_id.clone(),
			audience: self.request_audience(audience),
			scope: self.merged_scope(scope),
		}
	}

	fn expectations(&self, nonce: Option<String>) -> IdTokenExpectations {
		IdTokenExpectations {
			issuer: self.issuer.clone(),
			audience: self.client_id.clone(),
			nonce,
			leeway: self.leeway,
		}
	}

	/// Verifies an exchange response and derives the cache record for it. The
	/// record is not saved here; flows save after the whole renewal succeeded.
	async fn verify_token_response(
		&self,
		response: SessionTokenResponse,
		nonce: Option<String>,
		scope: String,
		audience: String,
	) -> Result<CachedToken> {
		if response.expires_in <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn.into());
		}

		let expectations = self.expectations(nonce);
		let decoded = self.verifier.verify(&response.id_token, &expectations).await?;

		Ok(CachedToken {
			id_token: auth::TokenSecret::new(response.id_token),
			decoded,
			client_id: self.client_id.clone(),
			audience,
			scope,
			issued_at: OffsetDateTime::now_utc(),
			expires_in: Duration::seconds(response.expires_in),
		})
	}

	async fn save_token(&self, token: &CachedToken) -> Result<()> {
		self.cache.save(token.clone()).await?;
		storage::persist_authentication_flag(self.store.as_ref()).await?;

		Ok(())
	}
}
impl Debug for SilentClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SilentClient")
			.field("client_id", &self.client_id)
			.field("issuer", &self.issuer)
			.field("audience", &self.audience)
			.field("scope", &self.scope)
			.field("use_refresh_tokens", &self.use_refresh_tokens)
			.finish_non_exhaustive()
	}
}

/// Builder for [`SilentClient`]; collaborators without defaults must be
/// injected before [`build`](Self::build).
pub struct SilentClientBuilder {
	options: ClientOptions,
	store: Option<Arc<dyn KeyValueStore>>,
	cache: Option<Arc<dyn TokenCache>>,
	mutex: Option<Arc<dyn RenewalMutex>>,
	transport: Option<Arc<dyn SessionTransport>>,
	verifier: Option<Arc<dyn IdTokenVerifier>>,
	authorizer: Option<Arc<dyn SilentAuthorizer>>,
}
impl SilentClientBuilder {
	/// Injects the durable key-value store; defaults to an in-process map.
	pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Overrides the token cache the configured cache location would select.
	pub fn cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Injects the renewal mutex; defaults to an in-process mutex. Deployments
	/// with several schedulers sharing a durable store should inject a
	/// [`StoreRenewalMutex`](crate::lock::StoreRenewalMutex) over that store.
	pub fn mutex(mut self, mutex: Arc<dyn RenewalMutex>) -> Self {
		self.mutex = Some(mutex);

		self
	}

	/// Injects the session transport (required).
	pub fn transport(mut self, transport: Arc<dyn SessionTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Injects the ID token verifier (required).
	pub fn verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
		self.verifier = Some(verifier);

		self
	}

	/// Injects the silent authorizer (required; the refresh grant falls back
	/// to it when a refresh token was invalidated under a live session).
	pub fn authorizer(mut self, authorizer: Arc<dyn SilentAuthorizer>) -> Self {
		self.authorizer = Some(authorizer);

		self
	}

	/// Validates the configuration and assembles the client. Fails fast on an
	/// unrecognized cache location, an unparseable domain, or a missing
	/// required collaborator; no network traffic happens here.
	pub fn build(self) -> Result<SilentClient> {
		let Self { options, store, cache, mutex, transport, verifier, authorizer } = self;
		let cache_location = options.cache_location.parse::<CacheLocation>()?;
		let base = parse_domain(&options.domain)?;
		let authorize_endpoint =
			base.join("authorize").map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let logout_endpoint =
			base.join("v2/logout").map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let issuer = options.issuer.unwrap_or_else(|| base.to_string());
		let scope = auth::scope::merge([
			Some(options.default_scope.as_deref().unwrap_or(DEFAULT_SCOPE)),
			options.scope.as_deref(),
			options.use_refresh_tokens.then_some("offline_access"),
		]);
		let store =
			store.unwrap_or_else(|| Arc::new(MemoryKeyValueStore::default()) as Arc<dyn KeyValueStore>);
		let cache = cache.unwrap_or_else(|| match cache_location {
			CacheLocation::Memory => Arc::new(MemoryTokenCache::default()) as Arc<dyn TokenCache>,
			CacheLocation::Persistent =>
				Arc::new(PersistentTokenCache::new(store.clone())) as Arc<dyn TokenCache>,
		});
		let mutex = mutex
			.unwrap_or_else(|| Arc::new(LocalRenewalMutex::default()) as Arc<dyn RenewalMutex>);
		let transport =
			transport.ok_or(ConfigError::MissingCollaborator { name: "session transport" })?;
		let verifier =
			verifier.ok_or(ConfigError::MissingCollaborator { name: "ID token verifier" })?;
		let authorizer =
			authorizer.ok_or(ConfigError::MissingCollaborator { name: "silent authorizer" })?;
		let mut extra_authorize_params = options.extra_authorize_params;

		if let Some(max_age) = options.max_age {
			extra_authorize_params.push(("max_age".into(), max_age.to_string()));
		}

		Ok(SilentClient {
			client_id: options.client_id,
			issuer,
			audience: options.audience.unwrap_or_else(|| DEFAULT_AUDIENCE.into()),
			scope,
			redirect_uri: options.redirect_uri,
			authorize_endpoint,
			logout_endpoint,
			use_refresh_tokens: options.use_refresh_tokens,
			leeway: options.leeway.unwrap_or(DEFAULT_VERIFY_LEEWAY),
			authorize_timeout: options
				.authorize_timeout
				.unwrap_or(DEFAULT_AUTHORIZE_TIMEOUT),
			extra_authorize_params,
			transactions: TransactionStore::new(store.clone()),
			store,
			cache,
			mutex,
			transport,
			verifier,
			authorizer,
		})
	}
}
impl Debug for SilentClientBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SilentClientBuilder").field("options", &self.options).finish_non_exhaustive()
	}
}

fn parse_domain(domain: &str) -> Result<Url, ConfigError> {
	let raw = if domain.contains("://") {
		Cow::Borrowed(domain)
	} else {
		Cow::Owned(format!("https://{domain}/"))
	};

	Url::parse(&raw).map_err(|source| ConfigError::InvalidDomain { source })
}
