//! Demonstrates a gateway persisting its token pair with `FileStore`, refreshing once on a
//! `401`, and replaying the rejected request with the new access token.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use auth_gateway::{
	auth::TokenSecret,
	gateway::{Gateway, GatewayConfig},
	http::{GatewayRequest, ReqwestTransport},
	refresh::JsonRefreshEndpoint,
	reqwest::Client,
	store::{CredentialStore, FileStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let stale_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/profile").header("authorization", "Bearer demo-access-1");
			then.status(401);
		})
		.await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/profile").header("authorization", "Bearer demo-access-2");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"name\":\"demo-user\"}");
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access-2\",\"refresh_token\":\"demo-refresh-2\"}");
		})
		.await;
	let store_path = env::temp_dir().join("auth-gateway-demo").join("tokens.json");
	let store: Arc<dyn CredentialStore> = Arc::new(FileStore::open(&store_path)?);
	let transport = Arc::new(ReqwestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	));
	let endpoint = <JsonRefreshEndpoint<ReqwestTransport>>::new(
		transport.clone(),
		Url::parse(&server.url("/auth/refresh"))?,
	);
	let gateway = <Gateway<ReqwestTransport, JsonRefreshEndpoint<ReqwestTransport>>>::with_store(
		transport, endpoint, store,
	)
	.with_config(GatewayConfig::default().with_base_url(Url::parse(&server.url("/api/"))?));

	gateway.set_tokens("demo-access-1", Some(TokenSecret::new("demo-refresh-1")))?;

	let response = gateway.send(GatewayRequest::get(gateway.url("profile")?)).await?;

	println!("Profile after refresh: {}.", response.text());
	println!("Tokens persisted to {}.", store_path.display());

	stale_mock.assert_async().await;
	refresh_mock.assert_async().await;
	profile_mock.assert_async().await;

	gateway.clear_tokens()?;

	Ok(())
}
