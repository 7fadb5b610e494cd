//! Request gateway with single-flight token refresh.
//!
//! [`Gateway::send`] signs each request with the stored access token and forwards it through
//! the [`Transport`]. The first `401 Unauthorized` observed while the gateway is
//! [`RefreshState::Idle`] starts a refresh cycle; every other `401` that lands while the
//! gateway is [`RefreshState::Refreshing`] is parked in a FIFO queue. Once fresh credentials
//! are stored the queue is released in arrival order and the gateway returns to `Idle`;
//! every caller, the refreshing one included, then replays its own request.
//!
//! A replayed request that is rejected again fails with
//! [`Error::Unauthorized`] (`retried: true`); it never starts a second refresh.

mod metrics;
mod queue;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{BearerSigner, RequestSigner, TokenPair, TokenSecret},
	error::ConfigError,
	gateway::queue::{Admission, RefreshCoordinator, RefreshGuard, Waiter},
	http::{GatewayRequest, GatewayResponse, Transport},
	obs::{self, GatewaySpan, Operation, Outcome},
	refresh::RefreshEndpoint,
	store::{CredentialStore, MemoryStore},
};

/// Refresh coordination state of a gateway instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshState {
	/// No refresh is in flight.
	#[default]
	Idle,
	/// A refresh call is in flight.
	Refreshing,
}

/// Runtime options for a [`Gateway`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	/// Refresh and replay on `401`; when `false` every `401` is returned as an error.
	#[serde(alias = "enableAutoRefresh")]
	pub enable_auto_refresh: bool,
	/// Base URL used by [`Gateway::url`] to resolve relative paths.
	#[serde(alias = "baseUrl")]
	pub base_url: Option<Url>,
}
impl GatewayConfig {
	/// Enables or disables refresh-on-`401`.
	pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
		self.enable_auto_refresh = enabled;

		self
	}

	/// Sets the base URL used to resolve relative request paths.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}
}
impl Default for GatewayConfig {
	fn default() -> Self {
		Self { enable_auto_refresh: true, base_url: None }
	}
}

/// Bearer-token gateway over a [`Transport`] with single-flight refresh.
///
/// Clones share the transport, store, refresh state, and queue; separately constructed
/// gateways never coordinate with each other.
pub struct Gateway<T, R>
where
	T: ?Sized + Transport,
	R: ?Sized + RefreshEndpoint,
{
	/// Shared counters for refresh cycles on this gateway.
	pub refresh_metrics: Arc<RefreshMetrics>,
	transport: Arc<T>,
	refresh_endpoint: Arc<R>,
	store: Arc<dyn CredentialStore>,
	signer: Arc<dyn RequestSigner>,
	config: GatewayConfig,
	coordinator: RefreshCoordinator,
}
impl<T, R> Gateway<T, R>
where
	T: ?Sized + Transport,
	R: ?Sized + RefreshEndpoint,
{
	/// Creates a gateway holding its credentials in a fresh [`MemoryStore`].
	pub fn new(transport: impl Into<Arc<T>>, refresh_endpoint: impl Into<Arc<R>>) -> Self {
		Self::with_store(transport, refresh_endpoint, Arc::new(MemoryStore::default()))
	}

	/// Creates a gateway backed by the caller-provided credential store.
	pub fn with_store(
		transport: impl Into<Arc<T>>,
		refresh_endpoint: impl Into<Arc<R>>,
		store: Arc<dyn CredentialStore>,
	) -> Self {
		Self {
			refresh_metrics: Default::default(),
			transport: transport.into(),
			refresh_endpoint: refresh_endpoint.into(),
			store,
			signer: Arc::new(BearerSigner),
			config: GatewayConfig::default(),
			coordinator: RefreshCoordinator::default(),
		}
	}

	/// Replaces the runtime configuration.
	pub fn with_config(mut self, config: GatewayConfig) -> Self {
		self.config = config;

		self
	}

	/// Replaces the request signer (defaults to [`BearerSigner`]).
	pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.signer = signer;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Credential store backing this gateway.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Replaces both tokens.
	pub fn set_tokens(
		&self,
		access_token: impl Into<TokenSecret>,
		refresh_token: Option<TokenSecret>,
	) -> Result<()> {
		self.store.save(TokenPair::new(access_token, refresh_token))?;

		Ok(())
	}

	/// Removes both tokens.
	pub fn clear_tokens(&self) -> Result<()> {
		self.store.clear()?;

		Ok(())
	}

	/// Current access token, if any.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.store.load().access_token
	}

	/// Current refresh token, if any.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.store.load().refresh_token
	}

	/// Returns `true` if an access token is held.
	pub fn is_authenticated(&self) -> bool {
		self.store.load().is_authenticated()
	}

	/// Current refresh state.
	pub fn refresh_state(&self) -> RefreshState {
		self.coordinator.state()
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.refresh_state() == RefreshState::Refreshing
	}

	/// Number of requests waiting on the in-flight refresh.
	pub fn pending_len(&self) -> usize {
		self.coordinator.pending_len()
	}

	/// Resolves `path` against the configured base URL.
	pub fn url(&self, path: &str) -> Result<Url> {
		let base = self.config.base_url.as_ref().ok_or(ConfigError::MissingBaseUrl)?;

		Ok(base.join(path).map_err(ConfigError::from)?)
	}

	/// Signs and dispatches `request`, refreshing credentials once on `401`.
	///
	/// Non-`401` responses, error statuses included, are returned unchanged. Transport
	/// failures surface as [`Error::Transport`].
	pub async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse> {
		let retried = request.is_retry();
		let response = self.dispatch_signed(request.clone()).await?;

		if !response.is_unauthorized() {
			return Ok(response);
		}
		if retried || !self.config.enable_auto_refresh {
			return Err(Error::Unauthorized { response: Box::new(response), retried });
		}

		match self.coordinator.admit(request) {
			Admission::Queued { waiter, request } => self.await_refresh(waiter, request).await,
			Admission::Leader { guard, request } => self.refresh_and_replay(guard, request).await,
		}
	}

	async fn dispatch_signed(&self, mut request: GatewayRequest) -> Result<GatewayResponse> {
		if let Some(access_token) = self.store.load().access_token {
			self.signer.sign(&mut request, &access_token)?;
		}

		Ok(self.transport.dispatch(request).await?)
	}

	async fn replay(&self, request: GatewayRequest) -> Result<GatewayResponse> {
		let span = GatewaySpan::new(Operation::Replay, "replay");

		span.instrument(async move {
			self.refresh_metrics.record_replay();

			let result = match self.dispatch_signed(request).await {
				Ok(response) if response.is_unauthorized() =>
					Err(Error::Unauthorized { response: Box::new(response), retried: true }),
				other => other,
			};

			obs::record_outcome(Operation::Replay, outcome_of(&result));

			result
		})
		.await
	}

	async fn await_refresh(
		&self,
		waiter: Waiter,
		request: GatewayRequest,
	) -> Result<GatewayResponse> {
		let span = GatewaySpan::new(Operation::Queue, "await_refresh");

		span.instrument(async move {
			self.refresh_metrics.record_queued();
			obs::record_outcome(Operation::Queue, Outcome::Attempt);

			// A dropped responder means the refresh never settled.
			let settled = waiter.await.unwrap_or(Err(Error::RefreshAbandoned));

			obs::record_outcome(Operation::Queue, outcome_of(&settled));
			settled?;

			self.replay(request).await
		})
		.await
	}

	async fn refresh_and_replay(
		&self,
		mut guard: RefreshGuard,
		request: GatewayRequest,
	) -> Result<GatewayResponse> {
		let span = GatewaySpan::new(Operation::Refresh, "refresh_and_replay");

		span.instrument(async move {
			self.refresh_metrics.record_attempt();
			obs::record_outcome(Operation::Refresh, Outcome::Attempt);

			if let Err(e) = self.refresh_credentials(&mut guard).await {
				self.refresh_metrics.record_failure();
				obs::record_outcome(Operation::Refresh, Outcome::Failure);

				return Err(e);
			}

			self.refresh_metrics.record_success();
			obs::record_outcome(Operation::Refresh, Outcome::Success);
			guard.resolve_all();
			drop(guard);

			self.replay(request).await
		})
		.await
	}

	async fn refresh_credentials(&self, guard: &mut RefreshGuard) -> Result<()> {
		let current = self.store.load();
		let Some(refresh_token) = current.refresh_token.clone() else {
			return Err(self.abort_refresh(guard, Error::AuthenticationRequired, "refresh_token"));
		};
		let refreshed = match self.refresh_endpoint.refresh(&refresh_token).await {
			Ok(refreshed) => refreshed,
			Err(e) => return Err(self.abort_refresh(guard, e.into(), "refresh_endpoint")),
		};

		if let Err(e) = self.store.save(current.rotate(refreshed)) {
			return Err(self.abort_refresh(guard, e.into(), "save_refreshed"));
		}

		Ok(())
	}

	fn abort_refresh(&self, guard: &mut RefreshGuard, err: Error, stage: &'static str) -> Error {
		guard.reject_all(&err, || {
			if let Err(e) = self.store.clear() {
				obs::report_store_failure(stage, &e);
			}
		});

		err
	}
}
impl<T, R> Clone for Gateway<T, R>
where
	T: ?Sized + Transport,
	R: ?Sized + RefreshEndpoint,
{
	fn clone(&self) -> Self {
		Self {
			refresh_metrics: self.refresh_metrics.clone(),
			transport: self.transport.clone(),
			refresh_endpoint: self.refresh_endpoint.clone(),
			store: self.store.clone(),
			signer: self.signer.clone(),
			config: self.config.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T, R> Debug for Gateway<T, R>
where
	T: ?Sized + Transport,
	R: ?Sized + RefreshEndpoint,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("config", &self.config)
			.field("refresh_state", &self.refresh_state())
			.field("pending_len", &self.pending_len())
			.field("refresh_metrics", &self.refresh_metrics)
			.finish_non_exhaustive()
	}
}

fn outcome_of<T>(result: &Result<T>) -> Outcome {
	if result.is_ok() { Outcome::Success } else { Outcome::Failure }
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION};
	// self
	use super::*;
	use crate::{
		auth::RefreshedTokens,
		error::{RefreshError, TransportError},
		http::TransportFuture,
		refresh::RefreshFuture,
	};

	struct StatusTransport(StatusCode);
	impl Transport for StatusTransport {
		fn dispatch(&self, _request: GatewayRequest) -> TransportFuture<'_> {
			let status = self.0;

			Box::pin(async move {
				Ok::<_, TransportError>(GatewayResponse::new(status, Vec::new()))
			})
		}
	}

	struct RejectingEndpoint;
	impl RefreshEndpoint for RejectingEndpoint {
		fn refresh<'a>(&'a self, _refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
			Box::pin(async move {
				Err::<RefreshedTokens, _>(RefreshError::Rejected {
					reason: "revoked".into(),
					status: Some(400),
				})
			})
		}
	}

	fn api_key() -> HeaderName {
		HeaderName::from_static("x-api-key")
	}

	#[derive(Default)]
	struct ApiKeySigner {
		signed: Mutex<Vec<String>>,
	}
	impl RequestSigner for ApiKeySigner {
		fn sign(&self, request: &mut GatewayRequest, access_token: &TokenSecret) -> Result<()> {
			let value = HeaderValue::try_from(access_token.expose())
				.map_err(ConfigError::http_request)?;

			request.headers.insert(api_key(), value);
			self.signed.lock().push(access_token.expose().to_owned());

			Ok(())
		}
	}

	/// Accepts only requests carrying `x-api-key: A2` and no `Authorization` header.
	struct ApiKeyTransport;
	impl Transport for ApiKeyTransport {
		fn dispatch(&self, request: GatewayRequest) -> TransportFuture<'_> {
			let key = request.headers.get(api_key()).and_then(|value| value.to_str().ok());
			let accepted = request.headers.get(AUTHORIZATION).is_none() && key == Some("A2");
			let status = if accepted { StatusCode::OK } else { StatusCode::UNAUTHORIZED };

			Box::pin(async move {
				Ok::<_, TransportError>(GatewayResponse::new(status, Vec::new()))
			})
		}
	}

	struct RotatingEndpoint;
	impl RefreshEndpoint for RotatingEndpoint {
		fn refresh<'a>(&'a self, _refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
			Box::pin(async move {
				Ok::<_, RefreshError>(RefreshedTokens::new("A2", Some(TokenSecret::new("R2"))))
			})
		}
	}

	fn gateway(status: StatusCode) -> Gateway<StatusTransport, RejectingEndpoint> {
		Gateway::new(StatusTransport(status), RejectingEndpoint)
	}

	fn request() -> GatewayRequest {
		GatewayRequest::get(Url::parse("https://api.example.com/me").expect("URL should parse."))
	}

	#[test]
	fn config_defaults_and_aliases() {
		let config: GatewayConfig =
			serde_json::from_str("{}").expect("Empty config should use defaults.");

		assert_eq!(config, GatewayConfig::default());
		assert!(config.enable_auto_refresh);

		let config: GatewayConfig = serde_json::from_str(
			r#"{"enableAutoRefresh":false,"baseUrl":"https://api.example.com/v1/"}"#,
		)
		.expect("camelCase config should parse.");

		assert!(!config.enable_auto_refresh);
		assert_eq!(config.base_url.as_ref().map(Url::as_str), Some("https://api.example.com/v1/"));
	}

	#[test]
	fn url_resolves_against_base() {
		let gateway = gateway(StatusCode::OK);

		assert!(matches!(gateway.url("users"), Err(Error::Config(ConfigError::MissingBaseUrl))));

		let base = Url::parse("https://api.example.com/v1/").expect("Base URL should parse.");
		let gateway = gateway.with_config(GatewayConfig::default().with_base_url(base));

		assert_eq!(
			gateway.url("users/7").expect("Relative path should resolve.").as_str(),
			"https://api.example.com/v1/users/7"
		);
	}

	#[test]
	fn credential_operations_round_trip() {
		let gateway = gateway(StatusCode::OK);

		assert!(!gateway.is_authenticated());

		gateway.set_tokens("A1", Some(TokenSecret::new("R1"))).expect("Memory saves succeed.");

		assert!(gateway.is_authenticated());
		assert_eq!(gateway.access_token().as_ref().map(TokenSecret::expose), Some("A1"));
		assert_eq!(gateway.clone().refresh_token().as_ref().map(TokenSecret::expose), Some("R1"));

		gateway.clear_tokens().expect("Memory clears succeed.");

		assert!(gateway.access_token().is_none());
		assert!(gateway.refresh_token().is_none());
	}

	#[tokio::test]
	async fn non_unauthorized_statuses_pass_through() {
		let gateway = gateway(StatusCode::INTERNAL_SERVER_ERROR);
		let response = gateway.send(request()).await.expect("5xx is not a gateway error.");

		assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(gateway.refresh_state(), RefreshState::Idle);
		assert_eq!(gateway.refresh_metrics.attempts(), 0);
	}

	#[tokio::test]
	async fn disabled_auto_refresh_returns_unauthorized() {
		let gateway = gateway(StatusCode::UNAUTHORIZED)
			.with_config(GatewayConfig::default().with_auto_refresh(false));

		gateway.set_tokens("A1", Some(TokenSecret::new("R1"))).expect("Memory saves succeed.");

		match gateway.send(request()).await {
			Err(Error::Unauthorized { response, retried }) => {
				assert_eq!(response.status, StatusCode::UNAUTHORIZED);
				assert!(!retried);
			},
			other => panic!("Unexpected result: {other:?}."),
		}

		assert!(gateway.is_authenticated());
		assert!(!gateway.is_refreshing());
	}

	#[tokio::test]
	async fn custom_signer_signs_original_and_replayed_requests() {
		let signer = Arc::new(ApiKeySigner::default());
		let gateway = <Gateway<ApiKeyTransport, RotatingEndpoint>>::new(
			ApiKeyTransport,
			RotatingEndpoint,
		)
		.with_signer(signer.clone());

		gateway.set_tokens("A1", Some(TokenSecret::new("R1"))).expect("Memory saves succeed.");

		let response = gateway.send(request()).await.expect("Replay with A2 should succeed.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(*signer.signed.lock(), ["A1", "A2"]);
		assert_eq!(gateway.access_token().as_ref().map(TokenSecret::expose), Some("A2"));
		assert_eq!(gateway.refresh_metrics.replays(), 1);
	}

	#[tokio::test]
	async fn rejected_refresh_clears_credentials() {
		let gateway = gateway(StatusCode::UNAUTHORIZED);

		gateway.set_tokens("A1", Some(TokenSecret::new("R1"))).expect("Memory saves succeed.");

		let err = gateway.send(request()).await.expect_err("Rejected refresh must fail.");

		assert!(matches!(err, Error::Refresh(RefreshError::Rejected { .. })));
		assert!(err.requires_login());
		assert!(!gateway.is_authenticated());
		assert_eq!(gateway.refresh_state(), RefreshState::Idle);
		assert_eq!(gateway.refresh_metrics.attempts(), 1);
		assert_eq!(gateway.refresh_metrics.failures(), 1);
		assert_eq!(gateway.refresh_metrics.replays(), 0);
	}
}
