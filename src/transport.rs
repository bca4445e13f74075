//! Session transport contract and the JSON action protocol it speaks.
//!
//! The transport is the crate's only path to the identity provider: a single
//! POST endpoint accepting `{action: "login"|"refresh"|"logout", code?,
//! redirect_uri?}` and proxying it to the provider's token endpoint. Anything
//! session-cookie related (transparent refresh, retry-once) is the backend
//! client's concern and lives behind this trait.

// self
use crate::{_prelude::*, error::TransportError};

/// Actions understood by the session endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
	/// Exchange an authorization code from an interactive login.
	Login,
	/// Renew tokens, optionally exchanging a silent authorization code.
	Refresh,
	/// Destroy the provider-side session.
	Logout,
}

/// One request body for the session endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
	/// Requested action.
	pub action: SessionAction,
	/// Authorization code to exchange, when the action carries one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	/// Redirect URI the code was issued against.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub redirect_uri: Option<Url>,
}
impl SessionRequest {
	/// Exchange request for an interactive login code.
	pub fn login(code: impl Into<String>, redirect_uri: Url) -> Self {
		Self {
			action: SessionAction::Login,
			code: Some(code.into()),
			redirect_uri: Some(redirect_uri),
		}
	}

	/// Plain refresh-token-grant renewal.
	pub fn refresh() -> Self {
		Self { action: SessionAction::Refresh, code: None, redirect_uri: None }
	}

	/// Renewal that exchanges a silent authorization code.
	pub fn refresh_with_code(code: impl Into<String>, redirect_uri: Url) -> Self {
		Self {
			action: SessionAction::Refresh,
			code: Some(code.into()),
			redirect_uri: Some(redirect_uri),
		}
	}
}

/// Successful token payload returned by the session endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokenResponse {
	/// Raw ID token minted by the provider.
	pub id_token: String,
	/// Token lifetime in seconds from issuance.
	pub expires_in: i64,
	/// Rotated refresh token, when the backend surfaces one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
}

/// Future type returned by [`SessionTransport`] operations.
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Contract for the external session-refresh facility.
pub trait SessionTransport
where
	Self: Send + Sync,
{
	/// Performs a `login`/`refresh` exchange and returns the token payload.
	fn exchange(&self, request: SessionRequest) -> TransportFuture<'_, SessionTokenResponse>;

	/// Performs the `logout` action.
	fn logout(&self) -> TransportFuture<'_, ()>;

	/// Reports whether an underlying session currently exists. This is the
	/// authoritative authentication signal; the engine never derives it from
	/// the token cache alone.
	fn session_exists(&self) -> TransportFuture<'_, bool>;
}

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestSessionTransport;
#[cfg(feature = "reqwest")]
mod reqwest_transport {
	// std
	use std::sync::atomic::{AtomicBool, Ordering};
	// self
	use super::*;
	use crate::error::ConfigError;

	/// Reqwest-backed [`SessionTransport`] posting the action protocol to a
	/// single session endpoint with a cookie store enabled.
	///
	/// Session existence is tracked from observed traffic: a successful
	/// exchange marks the session live, a logout or an HTTP 401 marks it gone.
	/// Deployments with an out-of-band session signal can implement the trait
	/// directly instead.
	pub struct ReqwestSessionTransport {
		client: ReqwestClient,
		endpoint: Url,
		session_live: AtomicBool,
	}
	impl ReqwestSessionTransport {
		/// Builds a transport with its own cookie-aware HTTP client.
		pub fn new(endpoint: Url) -> Result<Self, ConfigError> {
			let client = ReqwestClient::builder().cookie_store(true).build()?;

			Ok(Self::with_client(client, endpoint))
		}

		/// Wraps an existing reqwest client; the client must keep its cookie
		/// store enabled for the session cookies to round-trip.
		pub fn with_client(client: ReqwestClient, endpoint: Url) -> Self {
			Self { client, endpoint, session_live: AtomicBool::new(false) }
		}

		/// Overrides the tracked session-existence state, e.g. after an
		/// application-level session probe.
		pub fn set_session_presumed(&self, live: bool) {
			self.session_live.store(live, Ordering::SeqCst);
		}

		async fn post(&self, body: &SessionRequest) -> Result<Vec<u8>, TransportError> {
			let response = self.client.post(self.endpoint.clone()).json(body).send().await?;
			let status = response.status().as_u16();

			if status == 401 {
				self.session_live.store(false, Ordering::SeqCst);
			}
			if status >= 400 {
				let body = response.text().await.unwrap_or_default();

				return Err(TransportError::Status { status, body });
			}

			Ok(response.bytes().await?.to_vec())
		}
	}
	impl SessionTransport for ReqwestSessionTransport {
		fn exchange(&self, request: SessionRequest) -> TransportFuture<'_, SessionTokenResponse> {
			Box::pin(async move {
				let bytes = self.post(&request).await?;
				let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
				let parsed: SessionTokenResponse = serde_path_to_error::deserialize(
					&mut deserializer,
				)
				.map_err(|source| TransportError::ResponseParse { source, status: None })?;

				self.session_live.store(true, Ordering::SeqCst);

				Ok(parsed)
			})
		}

		fn logout(&self) -> TransportFuture<'_, ()> {
			Box::pin(async move {
				let request = SessionRequest {
					action: SessionAction::Logout,
					code: None,
					redirect_uri: None,
				};

				self.post(&request).await?;
				self.session_live.store(false, Ordering::SeqCst);

				Ok(())
			})
		}

		fn session_exists(&self) -> TransportFuture<'_, bool> {
			Box::pin(async move { Ok(self.session_live.load(Ordering::SeqCst)) })
		}
	}
	impl Debug for ReqwestSessionTransport {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("ReqwestSessionTransport").field("endpoint", &self.endpoint).finish()
		}
	}
}
