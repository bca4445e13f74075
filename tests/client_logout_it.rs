mod common;

// std
use std::sync::atomic::Ordering;
// crates.io
use url::Url;
// self
use common::*;
use oidc_silent::{
	client::{GetTokenOptions, LogoutOptions},
	error::{Error, TransportError},
	storage,
};

async fn seed_login(harness: &Harness) {
	harness.transport.set_session(true);
	harness.transport.script_response(token_response("id-token-seed", 3600));
	harness
		.client
		.get_token_silently(GetTokenOptions::default())
		.await
		.expect("Seeding renewal should succeed.");
}

#[tokio::test]
async fn conflicting_options_fail_fast() {
	let harness = harness(|_| ());
	let err = harness
		.client
		.logout(LogoutOptions { federated: true, local_only: true, ..Default::default() })
		.await
		.expect_err("Requesting both federated and local-only must fail.");

	assert!(matches!(err, Error::Config(_)));
	assert_eq!(
		harness.transport.logout_calls.load(Ordering::SeqCst),
		0,
		"Validation happens before any transport call."
	);
}

#[tokio::test]
async fn local_only_logout_clears_state_without_a_logout_url() {
	let harness = harness(|_| ());

	seed_login(&harness).await;

	assert!(
		harness
			.client
			.get_user(&GetTokenOptions::default())
			.await
			.expect("Reading the user should succeed.")
			.is_some()
	);

	let url = harness
		.client
		.logout(LogoutOptions { local_only: true, ..Default::default() })
		.await
		.expect("Local-only logout should succeed.");

	assert_eq!(url, None, "Local-only logout never produces a navigation target.");
	assert_eq!(harness.transport.logout_calls.load(Ordering::SeqCst), 1);
	assert!(
		!harness.client.is_authenticated().await.expect("Session check should succeed."),
		"The provider-side session is gone."
	);
	assert!(
		!storage::peek_authentication_flag(harness.store.as_ref())
			.await
			.expect("Peeking the authentication flag should succeed."),
		"The local authentication hint is cleared."
	);
	assert!(
		harness
			.client
			.get_user(&GetTokenOptions::default())
			.await
			.expect("Reading the user should succeed.")
			.is_none(),
		"The token cache is cleared for this client."
	);
}

#[tokio::test]
async fn logout_url_carries_client_id_return_to_and_federated_marker() {
	let harness = harness(|_| ());
	let return_to =
		Url::parse("https://app.example.com/").expect("Return URL fixture should parse.");
	let url = harness
		.client
		.logout(LogoutOptions { federated: true, return_to: Some(return_to), ..Default::default() })
		.await
		.expect("Logout should succeed.")
		.expect("A non-local logout produces a navigation target.");

	assert!(url.path().ends_with("/v2/logout"));
	assert_eq!(query_value(&url, "client_id").as_deref(), Some(CLIENT_ID));
	assert_eq!(query_value(&url, "returnTo").as_deref(), Some("https://app.example.com/"));
	assert!(
		url.query_pairs().any(|(k, _)| k == "federated"),
		"Federated logout appends the federated marker."
	);
}

#[tokio::test]
async fn logout_failure_is_tolerated_only_when_the_session_is_gone() {
	// Session gone despite the error: tolerated.
	let harness = harness(|_| ());

	harness.transport.set_session(true);
	harness.transport.script_logout(
		Some(TransportError::Status { status: 400, body: "already logged out".into() }),
		false,
	);
	harness
		.client
		.logout(LogoutOptions { local_only: true, ..Default::default() })
		.await
		.expect("A failed logout with no remaining session should be tolerated.");

	// Session still alive after the error: propagated.
	let harness = common::harness(|_| ());

	harness.transport.set_session(true);
	harness.transport.script_logout(
		Some(TransportError::Status { status: 500, body: "backend down".into() }),
		true,
	);

	let err = harness
		.client
		.logout(LogoutOptions { local_only: true, ..Default::default() })
		.await
		.expect_err("A failed logout with a surviving session should propagate.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 500, .. })));
}

#[tokio::test]
async fn logout_without_a_session_skips_the_transport() {
	let harness = harness(|_| ());
	let url = harness
		.client
		.logout(LogoutOptions::default())
		.await
		.expect("Logging out without a session should succeed.");

	assert!(url.is_some());
	assert_eq!(
		harness.transport.logout_calls.load(Ordering::SeqCst),
		0,
		"No session means no logout exchange."
	);
}
