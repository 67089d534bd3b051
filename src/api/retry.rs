//! Inbound stage: recover from a `401` with one forced refresh, or give up on the session.
//!
//! Per logical request: `AwaitingResponse` → `Succeeded` for any status but `401`; a `401`
//! with the retry marker unset moves to `Retrying` (mark, force a refresh, re-stamp, resend)
//! and back to `AwaitingResponse`; a `401` with the marker set, or a failed refresh, moves to
//! `GivingUp`. The marker lives on the request, so concurrent failures each refresh on their
//! own and no state is shared between them.

// self
use crate::{
	_prelude::*,
	api::{ApiRequest, ApiResponse, Dispatcher, InvalidationReason, SessionInvalidated},
	http::ApiTransport,
	obs::{self, Stage, StageOutcome},
};

impl<T> Dispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	/// Resolves the response of the first attempt into the caller's outcome.
	pub(crate) async fn settle(
		&self,
		url: &Url,
		mut request: ApiRequest,
		mut response: ApiResponse,
	) -> Result<ApiResponse> {
		loop {
			if !response.is_unauthorized() {
				if request.retry_marker().is_set() {
					obs::record_stage_outcome(Stage::Retry, StageOutcome::Success);
				}

				return response.into_result();
			}
			if !request.mark_retry() {
				obs::record_stage_outcome(Stage::Retry, StageOutcome::Failure);

				let err = Error::AuthorizationFailed {
					status: response.status().as_u16(),
					body: response.text(),
				};

				self.give_up(&request, InvalidationReason::AuthorizationRejected, &err).await;

				return Err(err);
			}

			obs::record_stage_outcome(Stage::Retry, StageOutcome::Attempt);
			self.metrics.record_refresh();

			let restamped = match self.credentials.force_refresh().await {
				Ok(credential) => request.set_bearer(&credential),
				Err(err) => Err(err),
			};

			if let Err(err) = restamped {
				obs::record_stage_outcome(Stage::Retry, StageOutcome::Failure);
				self.give_up(&request, InvalidationReason::RefreshFailed, &err).await;

				return Err(err);
			}

			self.metrics.record_retry();

			response = self.transport.execute(url.clone(), &request).await?;
		}
	}

	async fn give_up(&self, request: &ApiRequest, reason: InvalidationReason, cause: &Error) {
		obs::session_invalidated(request, reason, cause);

		if let Err(err) = self.credentials.sign_out().await {
			obs::sign_out_failed(&err);
		}

		self.metrics.record_invalidation();
		self.observer.session_invalidated(&SessionInvalidated {
			reason,
			method: request.method().to_string(),
			path: request.path(),
			redirect_to: self.config.sign_in_path.clone(),
			occurred_at: OffsetDateTime::now_utc(),
		});
	}
}
