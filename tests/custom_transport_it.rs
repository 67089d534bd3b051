#![cfg(feature = "reqwest")]

// self
use shurl_client::{
	_preludet::*,
	api::{ApiRequest, ApiResponse, Dispatcher, InvalidationReason},
	auth::{Credential, Principal, PrincipalId},
	config::{ClientConfig, OAuthEndpoint},
	error::{ConfigError, TransientError, TransportError},
	http::{ApiTransport, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient, TransportFuture},
	oauth::{
		TransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION},
		},
	},
	session::{CredentialSource, MemoryCredentialSource, OAuthCredentialSource, SessionTokens},
};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy)]
struct ThrottledTokenClient {
	retry_after: Duration,
}
impl TokenHttpClient for ThrottledTokenClient {
	type Handle = ThrottledHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ThrottledHandle { slot, retry_after: self.retry_after }
	}
}

struct ThrottledHandle {
	slot: ResponseMetadataSlot,
	retry_after: Duration,
}
impl<'a> AsyncHttpClient<'a> for ThrottledHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, _request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let retry_after = self.retry_after;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingMapper {
	metadata: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl TransportErrorMapper<FakeTransportError> for RecordingMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		let status = meta.and_then(|value| value.status);
		let retry_after = meta.and_then(|value| value.retry_after);

		self.metadata.lock().push(meta.cloned());

		match err {
			HttpClientError::Reqwest(inner) => TransientError::TokenEndpoint {
				message: format!("fake transport error: {inner}"),
				status,
				retry_after,
			}
			.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransientError::TokenEndpoint {
				message: format!("unhandled HTTP client error: {other:?}"),
				status,
				retry_after,
			}
			.into(),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SeenRequest {
	method: String,
	url: String,
	authorization: Option<String>,
	body: Option<Vec<u8>>,
}

#[derive(Default)]
struct ScriptedTransport {
	statuses: Mutex<VecDeque<u16>>,
	seen: Mutex<Vec<SeenRequest>>,
}
impl ScriptedTransport {
	fn answering(statuses: impl IntoIterator<Item = u16>) -> Arc<Self> {
		Arc::new(Self { statuses: Mutex::new(statuses.into_iter().collect()), ..Default::default() })
	}

	fn seen(&self) -> Vec<SeenRequest> {
		self.seen.lock().clone()
	}
}
impl ApiTransport for ScriptedTransport {
	fn execute<'a>(&'a self, url: Url, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			self.seen.lock().push(SeenRequest {
				method: request.method().to_string(),
				url: url.to_string(),
				authorization: request.authorization().map(str::to_owned),
				body: request.body().map(<[u8]>::to_vec),
			});

			let status = self.statuses.lock().pop_front().unwrap_or(200);
			let status = StatusCode::from_u16(status).expect("Scripted status should be valid.");

			Ok(ApiResponse::new(status, HeaderMap::new(), b"{}".to_vec()))
		})
	}
}

fn principal() -> Principal {
	Principal::new(PrincipalId::new("uid-custom").expect("Principal identifier should be valid."))
}

fn config() -> ClientConfig {
	ClientConfig::builder()
		.base_url("https://api.shurl.test/v1")
		.sign_in_path("/auth/sign-in")
		.build()
		.expect("Client configuration should be valid.")
}

#[tokio::test]
async fn throttled_token_endpoint_keeps_the_session() {
	let endpoint = OAuthEndpoint::new("https://id.shurl.test/token", "throttled-client")
		.expect("Token endpoint fixture should be valid.");
	let mapper = RecordingMapper::default();
	let source = <OAuthCredentialSource<ThrottledTokenClient, RecordingMapper>>::new(
		&endpoint,
		ThrottledTokenClient { retry_after: Duration::seconds(5) },
		mapper.clone(),
	);

	source.sign_in(
		principal(),
		SessionTokens::new("a1", "r1", OffsetDateTime::now_utc() + Duration::hours(1)),
	);

	let err = source.force_refresh().await.expect_err("A throttled refresh should fail.");

	match err {
		Error::Transient(TransientError::TokenEndpoint { status, retry_after, .. }) => {
			assert_eq!(status, Some(429));
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert!(source.has_principal());
	assert_eq!(mapper.metadata.lock().len(), 1);
}

#[tokio::test]
async fn retry_changes_only_the_authorization_header() {
	let source = MemoryCredentialSource::signed_in(principal(), Credential::new("tok1"));

	source.queue_refresh(Credential::new("tok2"));

	let transport = ScriptedTransport::answering([401, 401]);
	let observer = Arc::new(RecordingObserver::default());
	let dispatcher = Dispatcher::<ScriptedTransport>::with_transport(
		config(),
		Arc::new(source.clone()),
		transport.clone(),
	)
	.with_observer(observer.clone());
	let request = ApiRequest::post("/u/shorten")
		.query("tag", "launch week")
		.json(&serde_json::json!({ "url": "https://example.com/launch" }))
		.expect("JSON body should serialize.");
	let err = dispatcher.send(request).await.expect_err("Two rejections should fail the call.");
	let seen = transport.seen();

	assert!(matches!(err, Error::AuthorizationFailed { status: 401, .. }));
	assert_eq!(seen.len(), 2);
	assert_eq!(seen[0].method, seen[1].method);
	assert_eq!(seen[0].url, "https://api.shurl.test/v1/u/shorten?tag=launch+week");
	assert_eq!(seen[0].url, seen[1].url);
	assert_eq!(seen[0].body, seen[1].body);
	assert_eq!(seen[0].authorization.as_deref(), Some("Bearer tok1"));
	assert_eq!(seen[1].authorization.as_deref(), Some("Bearer tok2"));

	let events = observer.events();

	assert_eq!(events.len(), 1);
	assert_eq!(events[0].reason, InvalidationReason::AuthorizationRejected);
	assert_eq!(events[0].redirect_to, "/auth/sign-in");
}

#[tokio::test]
async fn anonymous_requests_are_sent_unstamped() {
	let transport = ScriptedTransport::answering([200]);
	let dispatcher = Dispatcher::<ScriptedTransport>::with_transport(
		config(),
		Arc::new(MemoryCredentialSource::new()),
		transport.clone(),
	);
	let response = dispatcher
		.send(
			ApiRequest::get("/u/shortlinks")
				.header(AUTHORIZATION, HeaderValue::from_static("Bearer stale")),
		)
		.await
		.expect("Anonymous request should succeed.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(transport.seen()[0].authorization, None);
}
