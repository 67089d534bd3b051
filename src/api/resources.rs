//! Resource payloads and convenience operations for the shortener backend.

// self
use crate::{
	_prelude::*,
	api::{ApiRequest, Dispatcher},
	auth::ShortId,
	http::ApiTransport,
};

/// Body of `POST /u/shorten`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenRequest {
	/// Destination URL.
	pub url: String,
	/// Caller-chosen identifier; the backend generates one when absent.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub custom_id: Option<ShortId>,
	/// Hides the link from public listings.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub is_private: Option<bool>,
}
impl ShortenRequest {
	/// Creates a request for `url`.
	pub fn new(url: impl Into<String>) -> Result<Self> {
		let url = url.into();

		if url.trim().is_empty() {
			return Err(Error::InvalidRequest { reason: "destination URL is empty".into() });
		}

		Ok(Self { url, custom_id: None, is_private: None })
	}

	/// Sets a custom identifier. An empty string keeps the backend-generated one.
	pub fn with_custom_id(mut self, custom_id: &str) -> Result<Self> {
		self.custom_id =
			if custom_id.is_empty() { None } else { Some(ShortId::custom(custom_id)?) };

		Ok(self)
	}

	/// Marks the link private (or public).
	pub fn private(mut self, is_private: bool) -> Self {
		self.is_private = Some(is_private);

		self
	}
}

/// A short link owned by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
	/// Identifier used in `/r/<id>`.
	pub short_id: ShortId,
	/// Destination URL.
	#[serde(default)]
	pub url: String,
	/// Whether the link is hidden from public listings.
	#[serde(default)]
	pub is_private: bool,
	/// Creation instant.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub created_at: Option<OffsetDateTime>,
}

/// Response of `GET /u/click-count/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickCount {
	/// Link the count belongs to, when echoed by the backend.
	#[serde(default)]
	pub short_id: Option<ShortId>,
	/// Number of recorded clicks.
	#[serde(alias = "click_count", alias = "clicks", alias = "count")]
	pub total_clicks: u64,
}

/// One recorded click.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Click {
	/// When the click happened.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Client address as seen by the redirector.
	#[serde(default)]
	pub ip: String,
	/// Client user agent.
	#[serde(default)]
	pub user_agent: String,
}

/// Response of `GET /u/analytics/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
	/// Individual clicks.
	#[serde(default)]
	pub clicks: Vec<Click>,
	/// Total click count (may exceed `clicks.len()` when the backend pages).
	pub total_clicks: u64,
}

/// Formats accepted by the click export endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
	/// Comma-separated values.
	#[default]
	Csv,
	/// JSON document.
	Json,
}
impl ExportFormat {
	/// Query value and file extension.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExportFormat::Csv => "csv",
			ExportFormat::Json => "json",
		}
	}

	/// MIME type used when the backend omits one.
	pub const fn content_type(self) -> &'static str {
		match self {
			ExportFormat::Csv => "text/csv",
			ExportFormat::Json => "application/json",
		}
	}
}
impl Display for ExportFormat {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ExportFormat {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		if s.eq_ignore_ascii_case("csv") {
			Ok(Self::Csv)
		} else if s.eq_ignore_ascii_case("json") {
			Ok(Self::Json)
		} else {
			Err(Error::InvalidRequest { reason: format!("unsupported export format `{s}`") })
		}
	}
}

/// Downloaded click export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClickExport {
	/// Link the export belongs to.
	pub short_id: ShortId,
	/// Requested format.
	pub format: ExportFormat,
	/// MIME type reported by the backend, or the format's default.
	pub content_type: String,
	/// Raw export body.
	pub bytes: Vec<u8>,
}
impl ClickExport {
	/// Suggested download name, `clicks-<id>.<ext>`.
	pub fn filename(&self) -> String {
		format!("clicks-{}.{}", self.short_id, self.format.as_str())
	}
}

/// A blocked entry on the admin blacklist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
	/// Entry kind, e.g. `domain`.
	#[serde(rename = "type")]
	pub kind: String,
	/// Blocked value.
	pub value: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBlacklistEntry {
	Entry(BlacklistEntry),
	Domain(String),
}
impl From<RawBlacklistEntry> for BlacklistEntry {
	fn from(raw: RawBlacklistEntry) -> Self {
		match raw {
			RawBlacklistEntry::Entry(entry) => entry,
			RawBlacklistEntry::Domain(value) => Self { kind: "domain".into(), value },
		}
	}
}

#[derive(Serialize)]
struct AddBlacklist<'a> {
	domain: &'a str,
}

impl<T> Dispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a short link.
	pub async fn shorten(&self, request: &ShortenRequest) -> Result<ShortLink> {
		self.send(ApiRequest::post("/u/shorten").json(request)?).await?.json()
	}

	/// Lists the caller's short links.
	pub async fn short_links(&self) -> Result<Vec<ShortLink>> {
		self.send(ApiRequest::get("/u/shortlinks")).await?.json()
	}

	/// Fetches the click count of one link.
	pub async fn click_count(&self, short_id: &ShortId) -> Result<ClickCount> {
		self.send(ApiRequest::get("/u/click-count").segment(short_id.as_ref())).await?.json()
	}

	/// Downloads every recorded click of one link in `format`.
	pub async fn export_clicks(
		&self,
		short_id: &ShortId,
		format: ExportFormat,
	) -> Result<ClickExport> {
		let request = ApiRequest::get("/u/click-count")
			.segment(short_id.as_ref())
			.segment("export")
			.query("format", format.as_str());
		let response = self.send(request).await?;
		let content_type = response.content_type().unwrap_or(format.content_type()).to_owned();

		Ok(ClickExport {
			short_id: short_id.clone(),
			format,
			content_type,
			bytes: response.into_body(),
		})
	}

	/// Fetches per-click analytics of one link.
	pub async fn analytics(&self, short_id: &ShortId) -> Result<Analytics> {
		self.analytics_with(short_id, std::iter::empty::<(String, String)>()).await
	}

	/// Fetches per-click analytics with extra query parameters (paging, ranges).
	pub async fn analytics_with<I, K, V>(&self, short_id: &ShortId, params: I) -> Result<Analytics>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let request = params.into_iter().fold(
			ApiRequest::get("/u/analytics").segment(short_id.as_ref()),
			|request, (key, value)| request.query(key, value),
		);

		self.send(request).await?.json()
	}

	/// Lists blacklist entries (admin).
	pub async fn blacklist(&self) -> Result<Vec<BlacklistEntry>> {
		let raw: Vec<RawBlacklistEntry> = self.send(ApiRequest::get("/admin/blacklist")).await?.json()?;

		Ok(raw.into_iter().map(BlacklistEntry::from).collect())
	}

	/// Blocks `domain` (admin).
	pub async fn add_blacklist(&self, domain: &str) -> Result<()> {
		let domain = domain.trim();

		if domain.is_empty() {
			return Err(Error::InvalidRequest { reason: "blacklist domain is empty".into() });
		}

		self.send(ApiRequest::post("/admin/blacklist").json(&AddBlacklist { domain })?).await?;

		Ok(())
	}

	/// Removes the entry identified by `kind` and `value` (admin).
	pub async fn remove_blacklist(&self, kind: &str, value: &str) -> Result<()> {
		let request = ApiRequest::delete("/admin/blacklist").query("type", kind).query("value", value);

		self.send(request).await?;

		Ok(())
	}

	/// Public URL of a short link, built from the configured short hostname.
	pub fn short_url(&self, short_id: &ShortId) -> Option<Url> {
		self.config.short_url(short_id)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn shorten_request_omits_unset_fields() {
		let request = ShortenRequest::new("https://example.com/very/long")
			.expect("Request should build.")
			.with_custom_id("")
			.expect("Empty custom ids are ignored.");

		assert_eq!(
			serde_json::to_value(&request).expect("Request should serialize."),
			serde_json::json!({ "url": "https://example.com/very/long" })
		);

		let request = request.with_custom_id("promo").expect("Custom id should be valid.").private(true);

		assert_eq!(
			serde_json::to_value(&request).expect("Request should serialize."),
			serde_json::json!({
				"url": "https://example.com/very/long",
				"custom_id": "promo",
				"is_private": true,
			})
		);
	}

	#[test]
	fn shorten_request_rejects_blank_input() {
		assert!(matches!(ShortenRequest::new("  "), Err(Error::InvalidRequest { .. })));

		let err = ShortenRequest::new("https://example.com")
			.expect("Request should build.")
			.with_custom_id("has space")
			.expect_err("Whitespace in custom ids must be rejected.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	#[test]
	fn short_links_decode_with_optional_fields() {
		let links: Vec<ShortLink> = serde_json::from_value(serde_json::json!([
			{
				"short_id": "abc",
				"url": "https://example.com",
				"is_private": true,
				"created_at": "2024-05-01T12:30:00Z",
			},
			{ "short_id": "def" },
		]))
		.expect("Short links should decode.");

		assert!(links[0].is_private);
		assert_eq!(links[0].created_at.map(|at| at.unix_timestamp()), Some(1_714_566_600));
		assert_eq!(links[1].url, "");
		assert_eq!(links[1].created_at, None);
	}

	#[test]
	fn click_count_accepts_known_aliases() {
		for field in ["total_clicks", "click_count", "clicks", "count"] {
			let count: ClickCount = serde_json::from_str(&format!("{{\"{field}\":7}}"))
				.expect("Click count should decode.");

			assert_eq!(count.total_clicks, 7);
		}
	}

	#[test]
	fn blacklist_accepts_entries_and_bare_domains() {
		let raw: Vec<RawBlacklistEntry> = serde_json::from_value(serde_json::json!([
			{ "type": "domain", "value": "spam.example" },
			"phish.example",
		]))
		.expect("Blacklist should decode.");
		let entries = raw.into_iter().map(BlacklistEntry::from).collect::<Vec<_>>();

		assert_eq!(entries[0], BlacklistEntry { kind: "domain".into(), value: "spam.example".into() });
		assert_eq!(entries[1], BlacklistEntry { kind: "domain".into(), value: "phish.example".into() });
	}

	#[test]
	fn export_metadata_follows_format() {
		let export = ClickExport {
			short_id: ShortId::new("abc").expect("Short id fixture should be valid."),
			format: ExportFormat::Json,
			content_type: ExportFormat::Json.content_type().into(),
			bytes: Vec::new(),
		};

		assert_eq!(export.filename(), "clicks-abc.json");
		assert_eq!("CSV".parse::<ExportFormat>().ok(), Some(ExportFormat::Csv));
		assert!("xml".parse::<ExportFormat>().is_err());
	}
}
