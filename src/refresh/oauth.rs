//! RFC 6749 `refresh_token` grant routed through the gateway's [`Transport`].

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, HttpRequest, HttpResponse, RefreshToken, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{RefreshedTokens, TokenSecret},
	error::{ConfigError, RefreshError, TransientError, TransportError},
	http::{GatewayRequest, ResponseMetadata, ResponseMetadataSlot, Transport},
	refresh::{RefreshEndpoint, RefreshFuture},
};

type TokenEndpointClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// How the client authenticates against the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientAuthMethod {
	/// HTTP Basic authentication with the client id and secret.
	#[default]
	ClientSecretBasic,
	/// Client id and secret sent in the form body.
	ClientSecretPost,
	/// Public client; only the client id is sent.
	PublicClient,
}

/// Refresh endpoint performing `grant_type=refresh_token` against an OAuth 2.0 token URL.
pub struct OAuth2RefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	token_url: Url,
	client_id: String,
	client_secret: Option<String>,
	auth_method: ClientAuthMethod,
	scopes: Vec<String>,
}
impl<T> OAuth2RefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	/// Creates an endpoint for `token_url` authenticating as `client_id`.
	pub fn new(transport: impl Into<Arc<T>>, token_url: Url, client_id: impl Into<String>) -> Self {
		Self {
			transport: transport.into(),
			token_url,
			client_id: client_id.into(),
			client_secret: None,
			auth_method: ClientAuthMethod::default(),
			scopes: Vec::new(),
		}
	}

	/// Sets or replaces the client secret used for confidential client auth modes.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the client authentication method (defaults to HTTP Basic).
	pub fn with_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Requests a narrowed scope set on every refresh.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	fn oauth_client(&self) -> TokenEndpointClient {
		let mut client = BasicClient::new(ClientId::new(self.client_id.clone()))
			.set_token_uri(TokenUrl::from_url(self.token_url.clone()));

		let secret = match self.auth_method {
			ClientAuthMethod::PublicClient => None,
			ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost =>
				self.client_secret.clone(),
		};

		if let Some(secret) = secret {
			client = client.set_client_secret(ClientSecret::new(secret));
		}
		if self.auth_method == ClientAuthMethod::ClientSecretPost {
			client = client.set_auth_type(AuthType::RequestBody);
		}

		client
	}
}
impl<T> Debug for OAuth2RefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2RefreshEndpoint")
			.field("token_url", &self.token_url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("auth_method", &self.auth_method)
			.field("scopes", &self.scopes)
			.finish()
	}
}
impl<T> RefreshEndpoint for OAuth2RefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let client = self.oauth_client();
			let handle = TransportHandle::new(self.transport.clone(), meta.clone());
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = client.exchange_refresh_token(&secret);

			for scope in &self.scopes {
				request = request.add_scope(Scope::new(scope.clone()));
			}

			let response = request
				.request_async(&handle)
				.await
				.map_err(|err| map_request_error(meta.take(), err))?;

			Ok(RefreshedTokens::new(
				response.access_token().secret().to_owned(),
				response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned())),
			))
		})
	}
}

/// Adapter that lets the `oauth2` crate issue its token requests through a [`Transport`].
///
/// Each handle records the status and `Retry-After` hint of the last response in its
/// [`ResponseMetadataSlot`] so failures keep that context after `oauth2` maps them.
pub struct TransportHandle<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	slot: ResponseMetadataSlot,
}
impl<T> TransportHandle<T>
where
	T: ?Sized + Transport,
{
	/// Creates a handle that records outcomes in `slot`.
	pub fn new(transport: Arc<T>, slot: ResponseMetadataSlot) -> Self {
		Self { transport, slot }
	}
}
impl<'c, T> AsyncHttpClient<'c> for TransportHandle<T>
where
	T: ?Sized + Transport,
{
	type Error = HttpClientError<TransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let (parts, body) = request.into_parts();
			let url = Url::parse(&parts.uri.to_string()).map_err(|e| {
				HttpClientError::Other(format!("Token endpoint URI is invalid: {e}"))
			})?;
			let mut gateway_request = GatewayRequest::new(parts.method, url);

			gateway_request.headers = parts.headers;
			gateway_request.body = Some(body);

			let response = self
				.transport
				.dispatch(gateway_request)
				.await
				.map_err(|e| HttpClientError::Reqwest(Box::new(e)))?;

			self.slot.store(ResponseMetadata {
				status: Some(response.status.as_u16()),
				retry_after: response.retry_after(),
			});

			let mut http_response = HttpResponse::new(response.body);

			*http_response.status_mut() = response.status;
			*http_response.headers_mut() = response.headers;

			Ok(http_response)
		})
	}
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<TransportError>>,
) -> RefreshError {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta),
		RequestTokenError::Request(error) => map_transport_error(error, meta),
		RequestTokenError::Parse(error, _body) => TransientError::TokenResponseParse {
			source: Arc::new(error),
			status: meta_status(meta),
		}
		.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> RefreshError {
	let code = response.error().as_ref().to_owned();
	let reason = match response.error_description() {
		Some(description) => description.clone(),
		None => code.clone(),
	};

	match code.as_str() {
		"invalid_client" | "unauthorized_client" => RefreshError::InvalidClient { reason },
		"temporarily_unavailable" | "server_error" => TransientError::TokenEndpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => RefreshError::Rejected { reason, status: meta_status(meta) },
	}
}

fn map_transport_error(
	err: HttpClientError<TransportError>,
	meta: Option<&ResponseMetadata>,
) -> RefreshError {
	match err {
		HttpClientError::Reqwest(inner) => RefreshError::Transport(*inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::from(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
