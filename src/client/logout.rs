//! Logout flow: provider-side session teardown plus local state clearing.

// self
use crate::{
	_prelude::*,
	client::{LogoutOptions, SilentClient},
	error::ConfigError,
	obs::{self, FlowKind},
	storage,
};

impl SilentClient {
	/// Logs out: destroys the provider-side session when one exists, always
	/// clears this client's cache records and the local authentication hint,
	/// and returns the provider logout URL for the caller to navigate to
	/// (`None` for a local-only logout).
	pub async fn logout(&self, options: LogoutOptions) -> Result<Option<Url>> {
		obs::observe(FlowKind::Logout, "logout", self.logout_inner(options)).await
	}

	/// Destroys the provider-side session when one exists.
	///
	/// Also used by the login-required cleanup in the silent flow, so a failed
	/// renewal leaves the transport's session state matching the provider's.
	pub(super) async fn destroy_session(&self) -> Result<()> {
		if self.transport.session_exists().await? {
			if let Err(e) = self.transport.logout().await {
				// Idempotent-logout tolerance: the failure is swallowed only
				// when the session is verifiably gone afterwards.
				if self.transport.session_exists().await? {
					return Err(e.into());
				}
			}
		}

		Ok(())
	}

	async fn logout_inner(&self, options: LogoutOptions) -> Result<Option<Url>> {
		if options.federated && options.local_only {
			return Err(ConfigError::ConflictingLogoutOptions.into());
		}

		self.destroy_session().await?;
		self.cache.clear(&self.client_id).await?;
		storage::clear_authentication_flag(self.store.as_ref()).await?;

		if options.local_only {
			return Ok(None);
		}

		let mut url = self.logout_endpoint.clone();

		{
			let mut query = url.query_pairs_mut();

			query.append_pair("client_id", &self.client_id);

			if let Some(return_to) = &options.return_to {
				query.append_pair("returnTo", return_to.as_str());
			}
			if options.federated {
				query.append_key_only("federated");
			}
		}

		Ok(Some(url))
	}
}
