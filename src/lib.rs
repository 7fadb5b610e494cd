//! Bearer-token request gateway for remote authentication services: attach credentials,
//! intercept `401 Unauthorized`, refresh exactly once, and replay every request that
//! arrived while the refresh was in flight.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		gateway::{Gateway, GatewayConfig},
		http::ReqwestTransport,
		refresh::JsonRefreshEndpoint,
		store::{CredentialStore, MemoryStore},
	};

	/// Gateway type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGateway = Gateway<ReqwestTransport, JsonRefreshEndpoint<ReqwestTransport>>;

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`Gateway`] backed by an in-memory store and a JSON refresh endpoint, both
	/// sharing the reqwest transport used across integration tests.
	pub fn build_reqwest_test_gateway(
		refresh_url: Url,
		config: GatewayConfig,
	) -> (ReqwestTestGateway, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let transport = Arc::new(test_reqwest_transport());
		let endpoint = JsonRefreshEndpoint::new(transport.clone(), refresh_url);
		let gateway = Gateway::with_store(transport, endpoint, store).with_config(config);

		(gateway, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
