//! Credential source backed by an OAuth 2.0 `refresh_token` grant.
//!
//! [`OAuthCredentialSource`] caches the access credential with its expiry. Non-forcing reads
//! return the cache until the credential enters the preemptive window; forced reads always go to
//! the token endpoint. Every refresh runs under one singleflight guard and bumps a generation
//! counter, so a caller that queued behind an in-flight refresh reuses its result instead of
//! minting again. Denied refreshes (`invalid_grant`, `invalid_client`, `access_denied`, or a
//! 400/401/403 answer) sign the source out; transient failures leave the session intact.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use oauth2::http::Method;
// self
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};
use crate::{
	_prelude::*,
	auth::{Credential, Principal, TokenSecret},
	config::OAuthEndpoint,
	http::TokenHttpClient,
	oauth::{RefreshFacade, RefreshedTokens, TransportErrorMapper},
	obs::{self, DispatchSpan, Stage, StageOutcome},
	session::{CredentialSource, IdentityListener, IdentityListeners, SessionFuture, Subscription},
};

/// Default lead time before expiry at which cached credentials are refreshed.
pub const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);

#[cfg(feature = "reqwest")]
/// OAuth credential source using the crate's reqwest transport.
pub type ReqwestCredentialSource =
	OAuthCredentialSource<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Tokens held for the signed-in principal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTokens {
	/// Bearer credential presented to the backend.
	pub access: Credential,
	/// Refresh token exchanged at the token endpoint.
	pub refresh: TokenSecret,
	/// Instant the access credential expires.
	pub expires_at: OffsetDateTime,
}
impl SessionTokens {
	/// Creates a token set expiring at `expires_at`.
	pub fn new(
		access: impl Into<String>,
		refresh: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			access: Credential::new(access),
			refresh: TokenSecret::new(refresh),
			expires_at,
		}
	}

	fn is_fresh(&self, window: Duration, now: OffsetDateTime) -> bool {
		self.expires_at - window > now
	}

	fn apply(&mut self, refreshed: RefreshedTokens) {
		self.access = refreshed.access;
		self.expires_at = refreshed.expires_at;

		// Providers that do not rotate keep the previous refresh token valid.
		if let Some(refresh) = refreshed.refresh {
			self.refresh = refresh;
		}
	}
}

#[derive(Debug, Default)]
struct SourceState {
	session: Option<(Principal, SessionTokens)>,
	generation: u64,
}

/// Credential source refreshing through a token endpoint.
pub struct OAuthCredentialSource<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: RefreshFacade<C, M>,
	state: RwLock<SourceState>,
	singleflight: AsyncMutex<()>,
	preemptive_window: Duration,
	listeners: IdentityListeners,
	metrics: Arc<RefreshMetrics>,
}
impl<C, M> OAuthCredentialSource<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a signed-out source for `endpoint`.
	pub fn new(
		endpoint: &OAuthEndpoint,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			facade: RefreshFacade::from_endpoint(endpoint, http_client, error_mapper),
			state: Default::default(),
			singleflight: AsyncMutex::new(()),
			preemptive_window: DEFAULT_PREEMPTIVE_WINDOW,
			listeners: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Overrides how long before expiry cached credentials are refreshed.
	pub fn with_preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Stores the tokens obtained by the host's sign-in flow and notifies listeners.
	pub fn sign_in(&self, principal: Principal, tokens: SessionTokens) {
		{
			let mut state = self.state.write();

			state.session = Some((principal.clone(), tokens));
			state.generation += 1;
		}

		self.listeners.notify(Some(&principal));
	}

	/// Returns a snapshot of the held tokens.
	pub fn tokens(&self) -> Option<SessionTokens> {
		self.state.read().session.as_ref().map(|(_, tokens)| tokens.clone())
	}

	/// Returns the refresh counters.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	fn generation(&self) -> u64 {
		self.state.read().generation
	}

	async fn cached_or_refresh(&self) -> Result<Credential> {
		let observed = {
			let state = self.state.read();
			let (_, tokens) = state.session.as_ref().ok_or(Error::Unauthenticated)?;

			if tokens.is_fresh(self.preemptive_window, OffsetDateTime::now_utc()) {
				return Ok(tokens.access.clone());
			}

			state.generation
		};

		self.refresh(observed).await
	}

	/// Refreshes unless the state moved past `observed` while this caller waited.
	async fn refresh(&self, observed: u64) -> Result<Credential> {
		const STAGE: Stage = Stage::Refresh;

		let _singleflight = self.singleflight.lock().await;
		let refresh_token = {
			let state = self.state.read();
			let (_, tokens) = state.session.as_ref().ok_or(Error::Unauthenticated)?;

			if state.generation != observed {
				self.metrics.record_reuse();

				return Ok(tokens.access.clone());
			}

			tokens.refresh.clone()
		};
		let span = DispatchSpan::new(STAGE, &Method::POST, self.facade.token_path());

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);
		self.metrics.record_attempt();

		match span.instrument(self.facade.refresh_token(&refresh_token)).await {
			Ok(refreshed) => {
				obs::record_stage_outcome(STAGE, StageOutcome::Success);
				self.metrics.record_success();

				let mut state = self.state.write();

				if state.generation != observed {
					// Signed out or replaced while the exchange was in flight.
					return state
						.session
						.as_ref()
						.map(|(_, tokens)| tokens.access.clone())
						.ok_or(Error::Unauthenticated);
				}

				let (_, tokens) = state.session.as_mut().ok_or(Error::Unauthenticated)?;

				tokens.apply(refreshed);

				let access = tokens.access.clone();

				state.generation += 1;

				Ok(access)
			},
			Err(err) => {
				let denied = matches!(err, Error::RefreshDenied { .. });

				obs::record_stage_outcome(STAGE, StageOutcome::Failure);
				obs::refresh_failed(&err, denied);
				self.metrics.record_failure();

				if denied {
					self.end_session(Some(observed));
				}

				Err(err)
			},
		}
	}

	/// Drops the session, optionally only if it is still at generation `expected`.
	fn end_session(&self, expected: Option<u64>) {
		let ended = {
			let mut state = self.state.write();

			if expected.is_some_and(|generation| generation != state.generation) {
				false
			} else if state.session.take().is_some() {
				state.generation += 1;

				true
			} else {
				false
			}
		};

		if ended {
			self.listeners.notify(None);
		}
	}
}
#[cfg(feature = "reqwest")]
impl OAuthCredentialSource<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a signed-out source that refreshes through `http_client`.
	pub fn with_reqwest(endpoint: &OAuthEndpoint, http_client: ReqwestHttpClient) -> Self {
		Self::new(endpoint, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> CredentialSource for OAuthCredentialSource<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn has_principal(&self) -> bool {
		self.state.read().session.is_some()
	}

	fn principal(&self) -> Option<Principal> {
		self.state.read().session.as_ref().map(|(principal, _)| principal.clone())
	}

	fn current_credential(&self) -> SessionFuture<'_, Credential> {
		Box::pin(self.cached_or_refresh())
	}

	fn force_refresh(&self) -> SessionFuture<'_, Credential> {
		Box::pin(async move {
			let observed = self.generation();

			self.refresh(observed).await
		})
	}

	fn sign_out(&self) -> SessionFuture<'_, ()> {
		Box::pin(async move {
			self.end_session(None);

			Ok(())
		})
	}

	fn on_identity_change(&self, listener: IdentityListener) -> Subscription {
		self.listeners.subscribe(listener)
	}
}
impl<C, M> Debug for OAuthCredentialSource<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthCredentialSource")
			.field("token_path", &self.facade.token_path())
			.field("signed_in", &self.has_principal())
			.field("preemptive_window", &self.preemptive_window)
			.field("metrics", &self.metrics)
			.finish()
	}
}
