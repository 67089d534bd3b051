// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	api::{ApiRequest, InvalidationReason},
	obs::Stage,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span covering one logical request or one token refresh.
#[derive(Clone, Debug)]
pub struct DispatchSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl DispatchSpan {
	/// Creates a new span tagged with the stage and the request line.
	pub fn new(stage: Stage, method: &Method, path: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"shurl_client.dispatch",
				stage = stage.as_str(),
				method = method.as_str(),
				path
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, method, path);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs that a request leaves unstamped because no credential could be obtained.
pub(crate) fn credential_unavailable(request: &ApiRequest, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		method = request.method().as_str(),
		path = %request.path(),
		error = %err,
		"Credential unavailable; sending request without authorization."
	);

	#[cfg(not(feature = "tracing"))]
	let _ = (request, err);
}

/// Logs that the dispatcher is giving up on the session.
pub(crate) fn session_invalidated(request: &ApiRequest, reason: InvalidationReason, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		method = request.method().as_str(),
		path = %request.path(),
		reason = reason.as_str(),
		error = %err,
		"Session invalidated."
	);

	#[cfg(not(feature = "tracing"))]
	let _ = (request, reason, err);
}

/// Logs a sign-out failure that happened while giving up on the session.
pub(crate) fn sign_out_failed(err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(error = %err, "Failed to sign out after session invalidation.");

	#[cfg(not(feature = "tracing"))]
	let _ = err;
}

/// Logs a token endpoint failure observed by a credential source.
pub(crate) fn refresh_failed(err: &Error, denied: bool) {
	#[cfg(feature = "tracing")]
	if denied {
		tracing::warn!(error = %err, "Refresh token was rejected; signing out.");
	} else {
		tracing::warn!(error = %err, status = ?err.status(), "Token refresh failed transiently.");
	}

	#[cfg(not(feature = "tracing"))]
	let _ = (err, denied);
}
