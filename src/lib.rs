//! Authenticated client for the shurl URL shortener.
//!
//! Every call is stamped with a bearer credential, a `401` triggers one refresh-then-retry, and
//! an unrecoverable session is reported to the host through a [`api::SessionObserver`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod session;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixture builders for integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		api::{Dispatcher, SessionInvalidated, SessionObserver},
		config::ClientConfig,
		http::ReqwestHttpClient,
		session::CredentialSource,
	};

	/// Dispatcher type alias used by reqwest-backed integration tests.
	pub type ReqwestTestDispatcher = Dispatcher<ReqwestHttpClient>;

	/// Observer that keeps every [`SessionInvalidated`] event it receives.
	#[derive(Debug, Default)]
	pub struct RecordingObserver(Mutex<Vec<SessionInvalidated>>);
	impl RecordingObserver {
		/// Returns a snapshot of the recorded events.
		pub fn events(&self) -> Vec<SessionInvalidated> {
			self.0.lock().clone()
		}

		/// Returns how many invalidations were observed.
		pub fn count(&self) -> usize {
			self.0.lock().len()
		}
	}
	impl SessionObserver for RecordingObserver {
		fn session_invalidated(&self, event: &SessionInvalidated) {
			self.0.lock().push(event.clone());
		}
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`Dispatcher`] pointed at `base_url` with a recording observer attached.
	pub fn build_reqwest_test_dispatcher(
		base_url: &str,
		credentials: Arc<dyn CredentialSource>,
	) -> (ReqwestTestDispatcher, Arc<RecordingObserver>) {
		let config = ClientConfig::builder()
			.base_url(base_url)
			.short_hostname("localhost:8080")
			.build()
			.expect("Test client configuration should be valid.");
		let observer = Arc::new(RecordingObserver::default());
		let dispatcher = Dispatcher::with_transport(config, credentials, test_reqwest_http_client())
			.with_observer(observer.clone());

		(dispatcher, observer)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
