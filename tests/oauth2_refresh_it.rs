#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use auth_gateway::{
	_preludet::*,
	auth::TokenSecret,
	error::{RefreshError, TransientError},
	gateway::Gateway,
	http::{GatewayRequest, ReqwestTransport},
	refresh::{ClientAuthMethod, OAuth2RefreshEndpoint, RefreshEndpoint},
};

const CLIENT_ID: &str = "client-refresh";
const CLIENT_SECRET: &str = "secret-refresh";

type ReqwestOAuth2Endpoint = OAuth2RefreshEndpoint<ReqwestTransport>;

fn endpoint(server: &MockServer, method: ClientAuthMethod) -> ReqwestOAuth2Endpoint {
	let token_url = Url::parse(&server.url("/token")).expect("Mock token URL should parse.");

	ReqwestOAuth2Endpoint::new(test_reqwest_transport(), token_url, CLIENT_ID)
		.with_client_secret(CLIENT_SECRET)
		.with_auth_method(method)
}

#[tokio::test]
async fn refresh_grant_returns_rotated_tokens() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header_exists("authorization");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-new\",\"refresh_token\":\"refresh-new\",\"token_type\":\"bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let tokens = endpoint(&server, ClientAuthMethod::ClientSecretBasic)
		.refresh(&TokenSecret::new("refresh-old"))
		.await
		.expect("Refresh grant should succeed.");

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "access-new");
	assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-new"));
}

#[tokio::test]
async fn invalid_grant_is_rejected_with_status() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Token revoked\"}");
		})
		.await;
	let err = endpoint(&server, ClientAuthMethod::ClientSecretPost)
		.refresh(&TokenSecret::new("refresh-revoked"))
		.await
		.expect_err("invalid_grant must fail the refresh.");

	mock.assert_async().await;

	match err {
		RefreshError::Rejected { reason, status } => {
			assert_eq!(reason, "Token revoked");
			assert_eq!(status, Some(400));
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn temporarily_unavailable_keeps_retry_hint() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503)
				.header("content-type", "application/json")
				.header("retry-after", "5")
				.body("{\"error\":\"temporarily_unavailable\"}");
		})
		.await;
	let err = endpoint(&server, ClientAuthMethod::ClientSecretBasic)
		.refresh(&TokenSecret::new("refresh-busy"))
		.await
		.expect_err("503 must fail the refresh.");

	mock.assert_async().await;

	match err {
		RefreshError::Transient(TransientError::TokenEndpoint { status, retry_after, .. }) => {
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn gateway_refreshes_through_oauth2_endpoint() {
	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-old");
			then.status(401);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-new");
			then.status(200).body("ok");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-new\",\"token_type\":\"bearer\",\"expires_in\":600}",
			);
		})
		.await;
	let transport = Arc::new(test_reqwest_transport());
	let token_url = Url::parse(&server.url("/token")).expect("Mock token URL should parse.");
	let refresh = ReqwestOAuth2Endpoint::new(transport.clone(), token_url, CLIENT_ID)
		.with_auth_method(ClientAuthMethod::PublicClient);
	let gateway: Gateway<ReqwestTransport, ReqwestOAuth2Endpoint> =
		Gateway::new(transport, refresh);

	gateway
		.set_tokens("access-old", Some(TokenSecret::new("refresh-old")))
		.expect("Seeding the memory store should succeed.");

	let url = Url::parse(&server.url("/me")).expect("Mock URL should parse.");
	let response = gateway
		.send(GatewayRequest::get(url))
		.await
		.expect("Request should succeed after refresh.");

	assert_eq!(response.text(), "ok");

	stale.assert_async().await;
	fresh.assert_async().await;
	token.assert_async().await;

	// No rotated refresh token in the response; the held one is kept.
	assert_eq!(gateway.refresh_token().as_ref().map(TokenSecret::expose), Some("refresh-old"));
}
