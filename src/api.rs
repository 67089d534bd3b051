//! Resilient request dispatch against the shortener backend.
//!
//! Every call flows through [`Dispatcher::send`]: the outbound stage stamps the current bearer
//! credential onto the [`ApiRequest`], the [`ApiTransport`](crate::http::ApiTransport) sends it,
//! and the inbound stage intercepts `401` responses. A rejected request is refreshed and resent
//! at most once, tracked by the [`RetryMarker`] it carries; a second rejection or a failed
//! refresh signs the credential source out and notifies the host's [`SessionObserver`].
//! Resource helpers (`shorten`, `short_links`, `analytics`, ...) build envelopes and decode the
//! JSON payloads on top of that contract.

pub mod dispatcher;
pub mod metrics;
pub mod resources;

mod retry;
mod stamp;

pub use dispatcher::*;
pub use metrics::DispatchMetrics;
pub use resources::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::Credential, error::ConfigError};

/// Per-request flag bounding forced refresh-and-retry to a single cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryMarker(bool);
impl RetryMarker {
	/// Returns `true` once the request has been through a forced refresh.
	pub fn is_set(self) -> bool {
		self.0
	}

	/// Sets the marker, returning `false` when it was already set.
	pub fn mark(&mut self) -> bool {
		!std::mem::replace(&mut self.0, true)
	}
}

/// Outbound request envelope.
///
/// Path segments are stored raw and percent-encoded when the final URL is built, so
/// identifiers containing `/`, `?`, `#` or spaces stay inside their segment. Only the
/// `Authorization` header is touched by the dispatcher; method, path, query and body are
/// identical on every attempt.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	method: Method,
	segments: Vec<String>,
	query: Vec<(String, String)>,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
	timeout: Option<StdDuration>,
	retry: RetryMarker,
}
impl ApiRequest {
	/// Creates a request for a literal path such as `/u/shortlinks`.
	pub fn new(method: Method, path: &str) -> Self {
		Self {
			method,
			segments: path.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: None,
			timeout: None,
			retry: RetryMarker::default(),
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: &str) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: &str) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: &str) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a raw path segment; it is percent-encoded when the URL is built.
	pub fn segment(mut self, raw: impl Into<String>) -> Self {
		self.segments.push(raw.into());

		self
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a header, replacing any previous value.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body)
			.map_err(|e| Error::InvalidRequest { reason: format!("body is not serializable: {e}") })?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}

	/// Bounds each attempt (initial and retried) by `timeout`.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Raw path segments.
	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	/// Human-readable path (segments joined without encoding) for logs.
	pub fn path(&self) -> String {
		let mut path = String::new();

		for segment in &self.segments {
			path.push('/');
			path.push_str(segment);
		}

		if path.is_empty() { "/".into() } else { path }
	}

	/// Query parameters in insertion order.
	pub fn query_pairs(&self) -> &[(String, String)] {
		&self.query
	}

	/// Header map, including the stamped `Authorization` header.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Body bytes, if any.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Per-attempt timeout, if any.
	pub fn timeout(&self) -> Option<StdDuration> {
		self.timeout
	}

	/// Retry marker carried by this request.
	pub fn retry_marker(&self) -> RetryMarker {
		self.retry
	}

	/// Current `Authorization` header value, if it is valid UTF-8.
	pub fn authorization(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
	}

	/// Builds the absolute URL below `base`, keeping any path prefix the base carries.
	pub fn url(&self, base: &Url) -> Result<Url> {
		let mut url = base.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::UnsupportedUrl { field: "base", url: base.to_string() })?
			.pop_if_empty()
			.extend(&self.segments);

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&self.query);
		}

		Ok(url)
	}

	pub(crate) fn set_timeout_if_unset(&mut self, timeout: Option<StdDuration>) {
		if self.timeout.is_none() {
			self.timeout = timeout;
		}
	}

	pub(crate) fn set_bearer(&mut self, credential: &Credential) -> Result<()> {
		let mut value = HeaderValue::from_str(&credential.bearer()).map_err(|_| {
			Error::InvalidRequest { reason: "credential is not a valid header value".into() }
		})?;

		value.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	pub(crate) fn clear_authorization(&mut self) {
		self.headers.remove(AUTHORIZATION);
	}

	pub(crate) fn mark_retry(&mut self) -> bool {
		self.retry.mark()
	}
}

/// Raw backend response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl ApiResponse {
	/// Wraps the parts of a received response.
	pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// HTTP status.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Body bytes.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Consumes the response, returning the body bytes.
	pub fn into_body(self) -> Vec<u8> {
		self.body
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// `Content-Type` header, if present and valid UTF-8.
	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { source })
	}

	pub(crate) fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Maps error statuses onto [`Error::Server`]; everything below 400 passes.
	pub(crate) fn into_result(self) -> Result<Self> {
		if self.status.is_client_error() || self.status.is_server_error() {
			Err(Error::Server { status: self.status.as_u16(), body: self.text() })
		} else {
			Ok(self)
		}
	}
}
