//! The dispatcher type, its construction, and the session invalidation signal.

// self
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestHttpClient};
use crate::{
	_prelude::*,
	api::{ApiRequest, ApiResponse, DispatchMetrics, stamp},
	config::ClientConfig,
	http::ApiTransport,
	obs::{self, DispatchSpan, Stage, StageOutcome},
	session::CredentialSource,
};

#[cfg(feature = "reqwest")]
/// Dispatcher specialized for the crate's default reqwest transport.
pub type ReqwestDispatcher = Dispatcher<ReqwestHttpClient>;

/// Why the dispatcher gave up on the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidationReason {
	/// The forced refresh after a `401` failed.
	RefreshFailed,
	/// The backend rejected the request again after a successful refresh.
	AuthorizationRejected,
}
impl InvalidationReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			InvalidationReason::RefreshFailed => "refresh_failed",
			InvalidationReason::AuthorizationRejected => "authorization_rejected",
		}
	}
}
impl Display for InvalidationReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Signal emitted once per logical request that ends the session.
///
/// Hosts react by routing the user to [`redirect_to`](Self::redirect_to); the dispatcher itself
/// never touches navigation state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInvalidated {
	/// Why the session ended.
	pub reason: InvalidationReason,
	/// Method of the request that triggered the invalidation.
	pub method: String,
	/// Path of the request that triggered the invalidation.
	pub path: String,
	/// Sign-in location configured for the client.
	pub redirect_to: String,
	/// Instant the dispatcher gave up.
	pub occurred_at: OffsetDateTime,
}

/// Receives [`SessionInvalidated`] signals.
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// Called after the credential source has been signed out.
	fn session_invalidated(&self, event: &SessionInvalidated);
}
impl<F> SessionObserver for F
where
	F: Fn(&SessionInvalidated) + Send + Sync,
{
	fn session_invalidated(&self, event: &SessionInvalidated) {
		self(event)
	}
}

/// Observer that ignores every signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreInvalidation;
impl SessionObserver for IgnoreInvalidation {
	fn session_invalidated(&self, _: &SessionInvalidated) {}
}

/// Authenticated API client for the shortener backend.
///
/// The dispatcher owns its transport, credential source, configuration, and observer so call
/// sites receive an explicitly constructed instance instead of reaching for ambient state.
/// Cloning is cheap and shares counters.
pub struct Dispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	/// Transport used for every attempt.
	pub transport: Arc<T>,
	/// Source of bearer credentials.
	pub credentials: Arc<dyn CredentialSource>,
	/// Base URL, short-link host, sign-in path, and default timeout.
	pub config: ClientConfig,
	/// Receiver of session invalidation signals.
	pub observer: Arc<dyn SessionObserver>,
	/// Shared dispatch counters.
	pub metrics: Arc<DispatchMetrics>,
}
impl<T> Dispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a dispatcher that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		credentials: Arc<dyn CredentialSource>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			transport: transport.into(),
			credentials,
			config,
			observer: Arc::new(IgnoreInvalidation),
			metrics: Default::default(),
		}
	}

	/// Sets or replaces the invalidation observer.
	pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
		self.observer = observer;

		self
	}

	/// Sends `request`, stamping the current credential and recovering from one `401`.
	///
	/// Non-`401` error statuses surface as [`Error::Server`] and transport failures as
	/// [`Error::Transport`], both without side effects. Dropping the returned future cancels
	/// the call, including any pending refresh or retry.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const STAGE: Stage = Stage::Dispatch;

		let span = DispatchSpan::new(STAGE, request.method(), &request.path());

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);
		self.metrics.record_request();

		let result = span
			.instrument(async move {
				let mut request = request;

				request.set_timeout_if_unset(self.config.request_timeout);

				let url = request.url(&self.config.base_url)?;

				stamp::stamp(self.credentials.as_ref(), &mut request).await;

				let response = self.transport.execute(url.clone(), &request).await?;

				self.settle(&url, request, response).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(STAGE, StageOutcome::Failure),
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl Dispatcher<ReqwestHttpClient> {
	/// Creates a dispatcher with its own reqwest client.
	///
	/// The client does not follow redirects, so a bearer header never leaks to another host.
	pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self::with_transport(config, credentials, ReqwestHttpClient::with_client(client)))
	}
}
impl<T> Clone for Dispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			credentials: self.credentials.clone(),
			config: self.config.clone(),
			observer: self.observer.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<T> Debug for Dispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("base_url", &self.config.base_url.as_str())
			.field("signed_in", &self.credentials.has_principal())
			.field("metrics", &self.metrics)
			.finish()
	}
}
