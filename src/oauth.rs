//! OAuth client facade for the `refresh_token` grant.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	config::{ClientAuthStyle, OAuthEndpoint},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

const BODY_PREVIEW_LEN: usize = 256;

/// Maps token endpoint transport failures into client [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a client error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_unknown_transport_error(meta),
		}
	}
}

/// Tokens returned by a successful refresh.
#[derive(Clone, Debug)]
pub(crate) struct RefreshedTokens {
	pub(crate) access: Credential,
	/// Rotated refresh token, when the provider issued one.
	pub(crate) refresh: Option<TokenSecret>,
	pub(crate) expires_at: OffsetDateTime,
}

pub(crate) struct RefreshFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	token_path: String,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> RefreshFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_endpoint(
		endpoint: &OAuthEndpoint,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		let mut oauth_client = BasicClient::new(ClientId::new(endpoint.client_id.clone()))
			.set_token_uri(TokenUrl::from_url(endpoint.token_url.clone()));

		if let Some(secret) = &endpoint.client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.clone()));
		}
		if matches!(endpoint.auth_style, ClientAuthStyle::RequestBody) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Self {
			oauth_client,
			token_path: endpoint.token_url.path().to_owned(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		}
	}

	/// Path of the token endpoint, used as a span field.
	pub(crate) fn token_path(&self) -> &str {
		&self.token_path
	}

	pub(crate) fn refresh_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> FacadeFuture<'a, RefreshedTokens> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

			map_refresh_token_response(response)
		})
	}
}

fn map_refresh_token_response(response: FacadeTokenResponse) -> Result<RefreshedTokens> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let expires_at = OffsetDateTime::now_utc()
		.checked_add(Duration::seconds(expires_in))
		.ok_or(ConfigError::ExpiresInOutOfRange)?;

	Ok(RefreshedTokens {
		access: Credential::new(response.access_token().secret().to_owned()),
		refresh: response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned())),
		expires_at,
	})
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, body) =>
			if is_denied_status(meta_status(meta_ref)) {
				Error::RefreshDenied {
					reason: format!(
						"token endpoint answered {}: {}",
						meta_status(meta_ref).unwrap_or_default(),
						body_preview(&body)
					),
				}
			} else {
				TransientError::TokenResponseParse { source: error, status: meta_status(meta_ref) }
					.into()
			},
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let message = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code,
	};
	let denied_code = match response.error() {
		BasicErrorResponseType::InvalidGrant
		| BasicErrorResponseType::InvalidClient
		| BasicErrorResponseType::UnauthorizedClient => true,
		BasicErrorResponseType::Extension(ext) => ext == "access_denied",
		_ => false,
	};

	if denied_code || is_denied_status(meta_status(meta)) {
		Error::RefreshDenied { reason: message }
	} else {
		TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into()
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::token_endpoint(err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn map_unknown_transport_error(meta: Option<&ResponseMetadata>) -> Error {
	TransientError::TokenEndpoint {
		message: "HTTP client error occurred while calling the token endpoint".into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn is_denied_status(status: Option<u16>) -> bool {
	matches!(status, Some(400 | 401 | 403))
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	match trimmed.char_indices().nth(BODY_PREVIEW_LEN) {
		Some((cut, _)) => format!("{}...", &trimmed[..cut]),
		None => trimmed.to_owned(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn oauth_error(code: BasicErrorResponseType) -> BasicErrorResponse {
		BasicErrorResponse::new(code, Some("described".into()), None)
	}

	fn meta(status: u16) -> Option<ResponseMetadata> {
		Some(ResponseMetadata { status: Some(status), retry_after: None })
	}

	#[test]
	fn grant_and_client_errors_deny_refresh() {
		for code in [
			BasicErrorResponseType::InvalidGrant,
			BasicErrorResponseType::InvalidClient,
			BasicErrorResponseType::Extension("access_denied".into()),
		] {
			let err = map_server_response_error(oauth_error(code), meta(200).as_ref());

			assert!(matches!(err, Error::RefreshDenied { .. }), "{err:?}");
		}
	}

	#[test]
	fn status_drives_classification_of_other_codes() {
		let denied = map_server_response_error(
			oauth_error(BasicErrorResponseType::InvalidRequest),
			meta(400).as_ref(),
		);
		let forbidden = map_server_response_error(
			oauth_error(BasicErrorResponseType::InvalidScope),
			meta(403).as_ref(),
		);
		let transient = map_server_response_error(
			oauth_error(BasicErrorResponseType::Extension("temporarily_unavailable".into())),
			Some(ResponseMetadata { status: Some(503), retry_after: Some(Duration::seconds(5)) })
				.as_ref(),
		);

		assert!(matches!(denied, Error::RefreshDenied { .. }));
		assert!(matches!(forbidden, Error::RefreshDenied { .. }));
		assert!(matches!(
			transient,
			Error::Transient(TransientError::TokenEndpoint {
				status: Some(503),
				retry_after: Some(_),
				..
			})
		));
	}

	#[test]
	fn body_preview_truncates_long_bodies() {
		let body = "x".repeat(BODY_PREVIEW_LEN + 10);
		let preview = body_preview(body.as_bytes());

		assert!(preview.ends_with("..."));
		assert_eq!(preview.len(), BODY_PREVIEW_LEN + 3);
		assert_eq!(body_preview(b"  short  "), "short");
	}

	#[test]
	fn refresh_response_requires_positive_expiry() {
		let response: FacadeTokenResponse = serde_json::from_value(serde_json::json!({
			"access_token": "a2",
			"token_type": "bearer",
		}))
		.expect("Token response fixture should deserialize.");

		assert!(matches!(
			map_refresh_token_response(response),
			Err(Error::Config(ConfigError::MissingExpiresIn))
		));

		let response: FacadeTokenResponse = serde_json::from_value(serde_json::json!({
			"access_token": "a2",
			"token_type": "bearer",
			"expires_in": 3600,
			"refresh_token": "r2",
		}))
		.expect("Token response fixture should deserialize.");
		let tokens = map_refresh_token_response(response).expect("Response should map.");

		assert_eq!(tokens.access.expose(), "a2");
		assert_eq!(tokens.refresh.as_ref().map(TokenSecret::expose), Some("r2"));
		assert!(tokens.expires_at > OffsetDateTime::now_utc());
	}
}
