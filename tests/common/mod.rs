//! Shared fakes and fixtures for the client integration tests.

// Each integration test binary uses its own subset of these fixtures.
#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use serde_json::{Map as JsonMap, Value as JsonValue};
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use oidc_silent::{
	auth::{DecodedIdToken, IdTokenClaims},
	authorize::{AuthorizationCodePayload, AuthorizeFuture, SilentAuthorizer},
	client::{ClientOptions, SilentClient},
	error::{Error, TransportError},
	storage::MemoryKeyValueStore,
	transport::{SessionRequest, SessionTokenResponse, SessionTransport, TransportFuture},
	verify::{IdTokenExpectations, IdTokenVerifier, VerificationError, VerifyFuture},
};

pub const CLIENT_ID: &str = "client-1";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";

/// Scripted [`SessionTransport`] recording every request it sees.
#[derive(Default)]
pub struct FakeTransport {
	session: AtomicBool,
	responses: Mutex<VecDeque<Result<SessionTokenResponse, TransportError>>>,
	logout_results: Mutex<VecDeque<LogoutScript>>,
	pub requests: Mutex<Vec<SessionRequest>>,
	pub exchange_calls: AtomicUsize,
	pub logout_calls: AtomicUsize,
}

pub struct LogoutScript {
	pub error: Option<TransportError>,
	pub session_after: bool,
}

impl FakeTransport {
	pub fn with_session(live: bool) -> Arc<Self> {
		let transport = Self::default();

		transport.session.store(live, Ordering::SeqCst);

		Arc::new(transport)
	}

	pub fn set_session(&self, live: bool) {
		self.session.store(live, Ordering::SeqCst);
	}

	pub fn script_response(&self, response: SessionTokenResponse) {
		self.responses.lock().push_back(Ok(response));
	}

	pub fn script_error(&self, error: TransportError) {
		self.responses.lock().push_back(Err(error));
	}

	pub fn script_logout(&self, error: Option<TransportError>, session_after: bool) {
		self.logout_results.lock().push_back(LogoutScript { error, session_after });
	}
}
impl SessionTransport for FakeTransport {
	fn exchange(&self, request: SessionRequest) -> TransportFuture<'_, SessionTokenResponse> {
		Box::pin(async move {
			self.requests.lock().push(request);
			self.exchange_calls.fetch_add(1, Ordering::SeqCst);

			match self.responses.lock().pop_front() {
				Some(Ok(response)) => {
					self.session.store(true, Ordering::SeqCst);

					Ok(response)
				},
				Some(Err(error)) => Err(error),
				None =>
					Err(TransportError::Status { status: 599, body: "unscripted exchange".into() }),
			}
		})
	}

	fn logout(&self) -> TransportFuture<'_, ()> {
		Box::pin(async move {
			self.logout_calls.fetch_add(1, Ordering::SeqCst);

			match self.logout_results.lock().pop_front() {
				Some(script) => {
					self.session.store(script.session_after, Ordering::SeqCst);

					match script.error {
						Some(error) => Err(error),
						None => Ok(()),
					}
				},
				None => {
					self.session.store(false, Ordering::SeqCst);

					Ok(())
				},
			}
		})
	}

	fn session_exists(&self) -> TransportFuture<'_, bool> {
		Box::pin(async move { Ok(self.session.load(Ordering::SeqCst)) })
	}
}

/// Verifier accepting every token and echoing the stated expectations into the
/// decoded claims, so nonce propagation is observable end to end.
#[derive(Default)]
pub struct FakeVerifier {
	pub reject: AtomicBool,
	pub calls: AtomicUsize,
	pub seen_nonces: Mutex<Vec<Option<String>>>,
	pub seen_leeways: Mutex<Vec<Duration>>,
}
impl IdTokenVerifier for FakeVerifier {
	fn verify<'a>(
		&'a self,
		raw_id_token: &'a str,
		expectations: &'a IdTokenExpectations,
	) -> VerifyFuture<'a> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen_nonces.lock().push(expectations.nonce.clone());
			self.seen_leeways.lock().push(expectations.leeway);

			if self.reject.load(Ordering::SeqCst) {
				return Err(VerificationError::InvalidSignature);
			}

			let now = OffsetDateTime::now_utc();
			let mut profile = JsonMap::new();

			profile.insert("name".into(), JsonValue::String("Jay Doe".into()));
			profile.insert("raw_token".into(), JsonValue::String(raw_id_token.into()));

			let claims = IdTokenClaims {
				iss: expectations.issuer.clone(),
				sub: "user-1".into(),
				aud: expectations.audience.clone(),
				exp: now + Duration::hours(1),
				iat: now,
				nonce: expectations.nonce.clone(),
				auth_time: None,
				profile,
			};

			Ok(DecodedIdToken::from_claims(claims))
		})
	}
}

/// Authorizer echoing the state parsed from the authorize URL, standing in for
/// the hidden-context round trip.
pub struct FakeAuthorizer {
	pub code: String,
	pub calls: AtomicUsize,
	pub last_url: Mutex<Option<Url>>,
	pub fail_with: Mutex<Option<Error>>,
	pub forced_state: Mutex<Option<String>>,
	pub hang: AtomicBool,
}
impl Default for FakeAuthorizer {
	fn default() -> Self {
		Self {
			code: "silent_code".into(),
			calls: AtomicUsize::new(0),
			last_url: Mutex::new(None),
			fail_with: Mutex::new(None),
			forced_state: Mutex::new(None),
			hang: AtomicBool::new(false),
		}
	}
}
impl SilentAuthorizer for FakeAuthorizer {
	fn authorize(&self, authorize_url: Url) -> AuthorizeFuture<'_> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			*self.last_url.lock() = Some(authorize_url.clone());

			if self.hang.load(Ordering::SeqCst) {
				std::future::pending::<()>().await;
			}
			if let Some(error) = self.fail_with.lock().take() {
				return Err(error);
			}

			let state = self
				.forced_state
				.lock()
				.clone()
				.or_else(|| query_value(&authorize_url, "state"))
				.unwrap_or_default();

			Ok(AuthorizationCodePayload { code: self.code.clone(), state })
		})
	}
}

/// A fully assembled client plus handles to every fake it was built from.
pub struct Harness {
	pub client: SilentClient,
	pub store: Arc<MemoryKeyValueStore>,
	pub transport: Arc<FakeTransport>,
	pub verifier: Arc<FakeVerifier>,
	pub authorizer: Arc<FakeAuthorizer>,
}

pub fn harness(tweak: impl FnOnce(&mut ClientOptions)) -> Harness {
	let mut options = ClientOptions::new("tenant.example.com", CLIENT_ID);

	options.redirect_uri =
		Some(Url::parse(REDIRECT_URI).expect("Redirect fixture should parse successfully."));

	tweak(&mut options);

	let store = Arc::new(MemoryKeyValueStore::default());
	let transport = FakeTransport::with_session(false);
	let verifier = Arc::new(FakeVerifier::default());
	let authorizer = Arc::new(FakeAuthorizer::default());
	let client = SilentClient::builder(options)
		.store(store.clone())
		.transport(transport.clone())
		.verifier(verifier.clone())
		.authorizer(authorizer.clone())
		.build()
		.expect("Test client should build successfully.");

	Harness { client, store, transport, verifier, authorizer }
}

pub fn token_response(id_token: &str, expires_in: i64) -> SessionTokenResponse {
	SessionTokenResponse { id_token: id_token.into(), expires_in, refresh_token: None }
}

pub fn query_value(url: &Url, key: &str) -> Option<String> {
	url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}

/// Builds the callback URL the provider would redirect to after a successful
/// login for `state`.
pub fn callback_url(code: &str, state: &str) -> Url {
	let mut url = Url::parse(REDIRECT_URI).expect("Redirect fixture should parse successfully.");

	url.query_pairs_mut().append_pair("code", code).append_pair("state", state);

	url
}
