//! Scriptable in-process credential source for tests, demos, and hosts with their own sign-in.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{Credential, Principal},
	session::{CredentialSource, IdentityListener, IdentityListeners, SessionFuture, Subscription},
};

/// Credential source whose refresh outcomes are staged by the caller.
///
/// Clones share state, so a test can keep a handle while the dispatcher owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialSource(Arc<MemoryState>);

#[derive(Debug, Default)]
struct MemoryState {
	inner: Mutex<MemoryInner>,
	listeners: IdentityListeners,
	refresh_calls: AtomicU64,
}

#[derive(Debug, Default)]
struct MemoryInner {
	session: Option<(Principal, Credential)>,
	staged: VecDeque<Credential>,
	revoked: bool,
}

impl MemoryCredentialSource {
	/// Creates a signed-out source.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a source already signed in as `principal`.
	pub fn signed_in(principal: Principal, credential: Credential) -> Self {
		let source = Self::new();

		source.0.inner.lock().session = Some((principal, credential));

		source
	}

	/// Signs `principal` in with `credential`, clearing any earlier revocation.
	pub fn sign_in(&self, principal: Principal, credential: Credential) {
		{
			let mut inner = self.0.inner.lock();

			inner.session = Some((principal.clone(), credential));
			inner.revoked = false;
		}

		self.0.listeners.notify(Some(&principal));
	}

	/// Stages the credential returned by the next forced refresh.
	pub fn queue_refresh(&self, credential: Credential) {
		self.0.inner.lock().staged.push_back(credential);
	}

	/// Makes every following forced refresh fail with [`Error::RefreshDenied`].
	pub fn revoke(&self) {
		self.0.inner.lock().revoked = true;
	}

	/// Returns the credential currently handed out, if signed in.
	pub fn current(&self) -> Option<Credential> {
		self.0.inner.lock().session.as_ref().map(|(_, credential)| credential.clone())
	}

	/// Returns how many forced refreshes were requested.
	pub fn refresh_calls(&self) -> u64 {
		self.0.refresh_calls.load(Ordering::SeqCst)
	}

	/// Returns the number of live identity subscriptions.
	pub fn listener_count(&self) -> usize {
		self.0.listeners.len()
	}

	fn refresh(&self) -> Result<Credential> {
		self.0.refresh_calls.fetch_add(1, Ordering::SeqCst);

		let mut inner = self.0.inner.lock();

		if inner.session.is_none() {
			return Err(Error::Unauthenticated);
		}
		if inner.revoked {
			return Err(Error::RefreshDenied { reason: "session was revoked".into() });
		}

		let next = inner.staged.pop_front().ok_or_else(|| Error::RefreshDenied {
			reason: "no refreshed credential is available".into(),
		})?;

		if let Some((_, credential)) = inner.session.as_mut() {
			*credential = next.clone();
		}

		Ok(next)
	}
}
impl CredentialSource for MemoryCredentialSource {
	fn has_principal(&self) -> bool {
		self.0.inner.lock().session.is_some()
	}

	fn principal(&self) -> Option<Principal> {
		self.0.inner.lock().session.as_ref().map(|(principal, _)| principal.clone())
	}

	fn current_credential(&self) -> SessionFuture<'_, Credential> {
		Box::pin(async move { self.current().ok_or(Error::Unauthenticated) })
	}

	fn force_refresh(&self) -> SessionFuture<'_, Credential> {
		Box::pin(async move { self.refresh() })
	}

	fn sign_out(&self) -> SessionFuture<'_, ()> {
		Box::pin(async move {
			let was_signed_in = self.0.inner.lock().session.take().is_some();

			if was_signed_in {
				self.0.listeners.notify(None);
			}

			Ok(())
		})
	}

	fn on_identity_change(&self, listener: IdentityListener) -> Subscription {
		self.0.listeners.subscribe(listener)
	}
}
