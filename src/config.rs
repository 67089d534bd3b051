//! Client configuration: backend location, short-link host, sign-in route, and OAuth endpoint.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, auth::ShortId, error::ConfigError};

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
/// Sign-in location reported by session invalidation signals.
pub const DEFAULT_SIGN_IN_PATH: &str = "/login";
/// Environment variable holding the backend base URL.
pub const ENV_API_URL: &str = "SHORTENER_API_URL";
/// Environment variable holding the public short-link host.
pub const ENV_SHORT_HOSTNAME: &str = "SHORT_HOSTNAME";
/// Environment variable holding the per-request timeout in whole seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SHORTENER_REQUEST_TIMEOUT_SECS";

/// Validated dispatcher configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Backend base URL; may carry a path prefix.
	pub base_url: Url,
	/// Host (optionally with port) that serves `/r/<id>` redirects.
	pub short_hostname: Option<String>,
	/// Location hosts should route to after a session is invalidated.
	pub sign_in_path: String,
	/// Timeout applied to each attempt of requests that do not set their own.
	pub request_timeout: Option<StdDuration>,
}
impl ClientConfig {
	/// Starts a builder seeded with the defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`, which maps variable names to values.
	///
	/// Empty values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let mut builder = Self::builder();

		if let Some(base_url) = read(ENV_API_URL) {
			builder = builder.base_url(base_url.trim());
		}
		if let Some(hostname) = read(ENV_SHORT_HOSTNAME) {
			builder = builder.short_hostname(hostname.trim());
		}
		if let Some(raw) = read(ENV_REQUEST_TIMEOUT_SECS) {
			let secs = raw.trim().parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
				ConfigError::InvalidEnv { name: ENV_REQUEST_TIMEOUT_SECS, value: raw.clone() }
			})?;

			builder = builder.request_timeout(StdDuration::from_secs(secs));
		}

		builder.build()
	}

	/// Builds the public short link for `short_id`.
	///
	/// Hosts containing `localhost` are served over `http`, everything else over `https`.
	/// Returns `None` when no short hostname is configured or it cannot form a URL.
	pub fn short_url(&self, short_id: &ShortId) -> Option<Url> {
		let hostname = self.short_hostname.as_deref()?;
		let scheme = if hostname.contains("localhost") { "http" } else { "https" };
		let mut url = Url::parse(&format!("{scheme}://{hostname}")).ok()?;

		url.path_segments_mut().ok()?.clear().push("r").push(short_id.as_ref());

		Some(url)
	}

	/// Returns `true` unless the short hostname points at `localhost`.
	pub fn is_production(&self) -> bool {
		!self.short_hostname.as_deref().is_some_and(|hostname| hostname.contains("localhost"))
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Raw base URL, validated by [`build`](Self::build).
	pub base_url: String,
	/// Public short-link host.
	pub short_hostname: Option<String>,
	/// Sign-in location.
	pub sign_in_path: String,
	/// Default per-attempt timeout.
	pub request_timeout: Option<StdDuration>,
}
impl ClientConfigBuilder {
	/// Sets the backend base URL.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = url.into();

		self
	}

	/// Sets the short-link host.
	pub fn short_hostname(mut self, hostname: impl Into<String>) -> Self {
		self.short_hostname = Some(hostname.into());

		self
	}

	/// Overrides the sign-in location.
	pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
		self.sign_in_path = path.into();

		self
	}

	/// Sets the default per-attempt timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig> {
		let base_url = parse_http_url("base", &self.base_url)?;
		let short_hostname = self
			.short_hostname
			.map(|hostname| hostname.trim().trim_end_matches('/').to_owned())
			.filter(|hostname| !hostname.is_empty());
		let sign_in_path = if self.sign_in_path.trim().is_empty() {
			DEFAULT_SIGN_IN_PATH.to_owned()
		} else {
			self.sign_in_path
		};

		Ok(ClientConfig {
			base_url,
			short_hostname,
			sign_in_path,
			request_timeout: self.request_timeout,
		})
	}
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.into(),
			short_hostname: None,
			sign_in_path: DEFAULT_SIGN_IN_PATH.into(),
			request_timeout: None,
		}
	}
}

/// How the OAuth client authenticates against the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthStyle {
	/// HTTP Basic authentication (`client_secret_basic`).
	#[default]
	Basic,
	/// Credentials in the form body (`client_secret_post`, or public clients).
	RequestBody,
}

/// Token endpoint settings for [`OAuthCredentialSource`](crate::session::OAuthCredentialSource).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthEndpoint {
	/// Token endpoint receiving `refresh_token` grants.
	pub token_url: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// Optional client secret; public clients leave it unset.
	pub client_secret: Option<String>,
	/// Client authentication style.
	pub auth_style: ClientAuthStyle,
}
impl OAuthEndpoint {
	/// Creates a public-client endpoint that sends its id in the request body.
	pub fn new(token_url: &str, client_id: impl Into<String>) -> Result<Self> {
		let client_id = client_id.into();

		if client_id.trim().is_empty() {
			return Err(Error::InvalidRequest { reason: "OAuth client id is empty".into() });
		}

		Ok(Self {
			token_url: parse_http_url("token", token_url)?,
			client_id,
			client_secret: None,
			auth_style: ClientAuthStyle::RequestBody,
		})
	}

	/// Attaches a client secret sent with `auth_style`.
	pub fn with_secret(mut self, secret: impl Into<String>, auth_style: ClientAuthStyle) -> Self {
		self.client_secret = Some(secret.into());
		self.auth_style = auth_style;

		self
	}
}

/// Parses `raw` as an absolute `http(s)` URL that can carry path segments.
pub(crate) fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })?;

	if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
		return Err(ConfigError::UnsupportedUrl { field, url: raw.to_owned() });
	}

	Ok(url)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn short_id(raw: &str) -> ShortId {
		ShortId::new(raw).expect("Short id fixture should be valid.")
	}

	#[test]
	fn defaults_point_at_local_backend() {
		let config = ClientConfig::builder().build().expect("Default configuration should build.");

		assert_eq!(config.base_url.as_str(), "http://localhost:8080/");
		assert_eq!(config.sign_in_path, "/login");
		assert_eq!(config.request_timeout, None);
		assert!(config.short_url(&short_id("abc")).is_none());
		assert!(config.is_production());
	}

	#[test]
	fn short_url_scheme_follows_hostname() {
		let local = ClientConfig::builder()
			.short_hostname("localhost:8080")
			.build()
			.expect("Local configuration should build.");
		let public = ClientConfig::builder()
			.short_hostname("sh.rl/")
			.build()
			.expect("Public configuration should build.");

		assert_eq!(
			local.short_url(&short_id("abc")).map(String::from).as_deref(),
			Some("http://localhost:8080/r/abc")
		);
		assert_eq!(
			public.short_url(&short_id("a?b")).map(String::from).as_deref(),
			Some("https://sh.rl/r/a%3Fb")
		);
		assert!(!local.is_production());
		assert!(public.is_production());
	}

	#[test]
	fn lookup_reads_every_variable() {
		let config = ClientConfig::from_lookup(|name| match name {
			ENV_API_URL => Some("https://api.sh.rl/v1".into()),
			ENV_SHORT_HOSTNAME => Some("sh.rl".into()),
			ENV_REQUEST_TIMEOUT_SECS => Some("15".into()),
			_ => None,
		})
		.expect("Environment configuration should build.");

		assert_eq!(config.base_url.as_str(), "https://api.sh.rl/v1");
		assert_eq!(config.short_hostname.as_deref(), Some("sh.rl"));
		assert_eq!(config.request_timeout, Some(StdDuration::from_secs(15)));
	}

	#[test]
	fn lookup_rejects_bad_values() {
		let err = ClientConfig::from_lookup(|name| {
			(name == ENV_REQUEST_TIMEOUT_SECS).then(|| "soon".to_owned())
		})
		.expect_err("A non-numeric timeout should be rejected.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::InvalidEnv { name: ENV_REQUEST_TIMEOUT_SECS, .. })
		));

		let err = ClientConfig::from_lookup(|name| {
			(name == ENV_API_URL).then(|| "ftp://files.example".to_owned())
		})
		.expect_err("Non-http base URLs should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::UnsupportedUrl { field: "base", .. })));
	}

	#[test]
	fn oauth_endpoint_requires_client_id() {
		assert!(OAuthEndpoint::new("https://id.example/token", " ").is_err());

		let endpoint = OAuthEndpoint::new("https://id.example/token", "spa")
			.expect("Endpoint fixture should be valid.")
			.with_secret("s3cr3t", ClientAuthStyle::Basic);

		assert_eq!(endpoint.auth_style, ClientAuthStyle::Basic);
		assert_eq!(endpoint.client_secret.as_deref(), Some("s3cr3t"));
	}
}
