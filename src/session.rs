//! Credential sources: the identity collaborator the dispatcher stamps and refreshes through.
//!
//! [`CredentialSource`] is the contract; [`MemoryCredentialSource`] is a scriptable in-process
//! implementation and [`OAuthCredentialSource`] refreshes against an OAuth 2.0 token endpoint.

pub mod memory;
pub mod refresh;

pub use memory::MemoryCredentialSource;
pub use refresh::*;

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, Principal},
};

/// Boxed future returned by [`CredentialSource`] methods.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Callback invoked whenever the signed-in identity changes (`None` after sign-out).
pub type IdentityListener = Box<dyn Fn(Option<&Principal>) + Send + Sync>;

type SharedListener = Arc<dyn Fn(Option<&Principal>) + Send + Sync>;
type ListenerTable = Mutex<BTreeMap<u64, SharedListener>>;

/// Source of bearer credentials for the signed-in principal.
///
/// The dispatcher only queries a source on demand; it never subscribes to identity changes.
/// Implementations own whatever caching they do, and must tolerate concurrent calls.
pub trait CredentialSource
where
	Self: Send + Sync,
{
	/// Returns the best-known signed-in state without blocking.
	fn has_principal(&self) -> bool;

	/// Returns a snapshot of the signed-in principal.
	fn principal(&self) -> Option<Principal>;

	/// Returns the current credential, refreshing only if the cached one is unusable.
	///
	/// Fails with [`Error::Unauthenticated`] when nobody is signed in.
	fn current_credential(&self) -> SessionFuture<'_, Credential>;

	/// Mints a new credential, bypassing any cache.
	///
	/// Fails with [`Error::RefreshDenied`] when the session can no longer be refreshed and with
	/// [`Error::Unauthenticated`] when nobody is signed in.
	fn force_refresh(&self) -> SessionFuture<'_, Credential>;

	/// Drops the local principal state. Signing out twice is not an error.
	fn sign_out(&self) -> SessionFuture<'_, ()>;

	/// Registers `listener` for identity changes until the returned [`Subscription`] drops.
	///
	/// Listeners are not called on registration; read [`principal`](Self::principal) for the
	/// current state.
	fn on_identity_change(&self, listener: IdentityListener) -> Subscription;
}

/// Registry of identity listeners shared by a source and its subscriptions.
#[derive(Clone, Default)]
pub struct IdentityListeners {
	next_id: Arc<AtomicU64>,
	table: Arc<ListenerTable>,
}
impl IdentityListeners {
	/// Adds `listener` and returns the guard that removes it.
	pub fn subscribe(&self, listener: IdentityListener) -> Subscription {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);

		self.table.lock().insert(id, Arc::from(listener));

		Subscription { id, table: Arc::downgrade(&self.table) }
	}

	/// Calls every registered listener with `principal`.
	///
	/// Listeners run outside the registry lock, so they may subscribe or unsubscribe.
	pub fn notify(&self, principal: Option<&Principal>) {
		let listeners = self.table.lock().values().cloned().collect::<Vec<_>>();

		for listener in listeners {
			listener(principal);
		}
	}

	/// Returns the number of live subscriptions.
	pub fn len(&self) -> usize {
		self.table.lock().len()
	}

	/// Returns `true` when nobody is subscribed.
	pub fn is_empty(&self) -> bool {
		self.table.lock().is_empty()
	}
}
impl Debug for IdentityListeners {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityListeners").field("len", &self.len()).finish()
	}
}

/// Keeps an identity listener registered; dropping it unsubscribes.
#[must_use = "Dropping a subscription unsubscribes its listener immediately."]
pub struct Subscription {
	id: u64,
	table: Weak<ListenerTable>,
}
impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(table) = self.table.upgrade() {
			table.lock().remove(&self.id);
		}
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscription").field("id", &self.id).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// self
	use super::*;

	#[test]
	fn dropping_subscription_unsubscribes() {
		let listeners = IdentityListeners::default();
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let subscription = listeners.subscribe(Box::new(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		}));

		listeners.notify(None);

		assert_eq!(listeners.len(), 1);

		drop(subscription);
		listeners.notify(None);

		assert!(listeners.is_empty());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn subscription_outliving_registry_is_harmless() {
		let listeners = IdentityListeners::default();
		let subscription = listeners.subscribe(Box::new(|_| {}));

		drop(listeners);
		drop(subscription);
	}
}
