//! Outbound stage: attach the current bearer credential to every request.

// self
use crate::{api::ApiRequest, obs, session::CredentialSource};

/// Stamps `request` with `Authorization: Bearer <credential>` when a principal is present.
///
/// Failures to obtain a credential never fail the dispatch; the request goes out without the
/// header and the backend's `401` drives the retry stage instead. Any header left over from a
/// previous stamping is removed first.
pub(crate) async fn stamp(source: &dyn CredentialSource, request: &mut ApiRequest) {
	request.clear_authorization();

	if !source.has_principal() {
		return;
	}

	let stamped = match source.current_credential().await {
		Ok(credential) => request.set_bearer(&credential),
		Err(err) => Err(err),
	};

	if let Err(err) = stamped {
		obs::credential_unavailable(request, &err);
	}
}
