#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use shurl_client::{
	_preludet::*,
	api::{BlacklistEntry, ExportFormat, ShortenRequest},
	auth::{Credential, Principal, PrincipalId, ShortId},
	session::MemoryCredentialSource,
};

fn admin_source() -> Arc<MemoryCredentialSource> {
	let principal =
		Principal::new(PrincipalId::new("admin-1").expect("Principal identifier should be valid."));

	Arc::new(MemoryCredentialSource::signed_in(principal, Credential::new("admin-token")))
}

fn short_id(raw: &str) -> ShortId {
	ShortId::new(raw).expect("Short id fixture should be valid.")
}

#[tokio::test]
async fn shorten_posts_only_set_fields() {
	let server = MockServer::start_async().await;
	let (dispatcher, _observer) = build_reqwest_test_dispatcher(&server.base_url(), admin_source());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/u/shorten")
				.header("authorization", "Bearer admin-token")
				.body("{\"url\":\"https://example.com/docs\"}");
			then.status(200).header("content-type", "application/json").body(
				"{\"short_id\":\"x1Yz\",\"url\":\"https://example.com/docs\",\"created_at\":\"2024-05-01T08:00:00Z\"}",
			);
		})
		.await;
	let request =
		ShortenRequest::new("https://example.com/docs").expect("Shorten request should be valid.");
	let link = dispatcher.shorten(&request).await.expect("Shortening should succeed.");

	mock.assert_async().await;

	assert_eq!(link.short_id.as_ref(), "x1Yz");
	assert!(!link.is_private);
	assert!(link.created_at.is_some());
	assert_eq!(
		dispatcher.short_url(&link.short_id).map(String::from).as_deref(),
		Some("http://localhost:8080/r/x1Yz")
	);
}

#[tokio::test]
async fn click_count_accepts_backend_aliases() {
	let server = MockServer::start_async().await;
	let (dispatcher, _observer) = build_reqwest_test_dispatcher(&server.base_url(), admin_source());

	server
		.mock_async(|when, then| {
			when.method(GET).path("/u/click-count/abc");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"short_id\":\"abc\",\"click_count\":42}");
		})
		.await;

	let count =
		dispatcher.click_count(&short_id("abc")).await.expect("Click count should decode.");

	assert_eq!(count.total_clicks, 42);
	assert_eq!(count.short_id.as_deref(), Some("abc"));
}

#[tokio::test]
async fn export_requests_format_and_names_the_file() {
	let server = MockServer::start_async().await;
	let (dispatcher, _observer) = build_reqwest_test_dispatcher(&server.base_url(), admin_source());
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/u/click-count/abc/export").query_param("format", "csv");
			then.status(200)
				.header("content-type", "text/csv; charset=utf-8")
				.body("timestamp,ip,user_agent\n2024-05-01T12:30:00Z,203.0.113.7,curl/8\n");
		})
		.await;
	let export = dispatcher
		.export_clicks(&short_id("abc"), ExportFormat::Csv)
		.await
		.expect("Export should succeed.");

	mock.assert_async().await;

	assert_eq!(export.filename(), "clicks-abc.csv");
	assert_eq!(export.content_type, "text/csv; charset=utf-8");
	assert!(export.bytes.starts_with(b"timestamp,ip,user_agent"));
}

#[tokio::test]
async fn analytics_forwards_extra_query_parameters() {
	let server = MockServer::start_async().await;
	let (dispatcher, _observer) = build_reqwest_test_dispatcher(&server.base_url(), admin_source());
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/u/analytics/abc")
				.query_param("page", "2")
				.query_param("per_page", "50");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"clicks\":[],\"total_clicks\":120}");
		})
		.await;
	let analytics = dispatcher
		.analytics_with(&short_id("abc"), [("page", "2"), ("per_page", "50")])
		.await
		.expect("Paged analytics should succeed.");

	mock.assert_async().await;

	assert!(analytics.clicks.is_empty());
	assert_eq!(analytics.total_clicks, 120);
}

#[tokio::test]
async fn blacklist_round_trip() {
	let server = MockServer::start_async().await;
	let (dispatcher, _observer) = build_reqwest_test_dispatcher(&server.base_url(), admin_source());
	let list = server
		.mock_async(|when, then| {
			when.method(GET).path("/admin/blacklist");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"type\":\"domain\",\"value\":\"spam.example\"},\"bad.example\"]");
		})
		.await;
	let add = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/admin/blacklist")
				.header("content-type", "application/json")
				.body("{\"domain\":\"evil.example\"}");
			then.status(201);
		})
		.await;
	let entries = dispatcher.blacklist().await.expect("Blacklist should decode.");

	dispatcher.add_blacklist(" evil.example ").await.expect("Adding a domain should succeed.");

	list.assert_async().await;
	add.assert_async().await;

	assert_eq!(
		entries,
		vec![
			BlacklistEntry { kind: "domain".into(), value: "spam.example".into() },
			BlacklistEntry { kind: "domain".into(), value: "bad.example".into() },
		]
	);
	assert!(matches!(
		dispatcher.add_blacklist("  ").await,
		Err(Error::InvalidRequest { .. })
	));
}

#[tokio::test]
async fn unexpected_payload_reports_decode_error() {
	let server = MockServer::start_async().await;
	let (dispatcher, observer) = build_reqwest_test_dispatcher(&server.base_url(), admin_source());

	server
		.mock_async(|when, then| {
			when.method(GET).path("/u/shortlinks");
			then.status(200).header("content-type", "application/json").body("{\"links\":[]}");
		})
		.await;

	let err = dispatcher.short_links().await.expect_err("An object is not a link list.");

	assert!(matches!(err, Error::Decode { .. }));
	assert_eq!(observer.count(), 0);
}

#[tokio::test]
async fn listing_keeps_backend_ids_as_issued() {
	let server = MockServer::start_async().await;
	let (dispatcher, _observer) = build_reqwest_test_dispatcher(&server.base_url(), admin_source());
	let long_id = "a".repeat(129);
	let body = format!(
		"[{{\"short_id\":\"ok\",\"url\":\"https://example.com/a\"}},{{\"short_id\":\"{long_id}\",\"url\":\"https://example.com/b\"}}]"
	);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/u/shortlinks");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;

	let links = dispatcher.short_links().await.expect("Issued ids should decode unchanged.");

	assert_eq!(links.len(), 2);
	assert_eq!(links[1].short_id.as_ref(), long_id);
	assert!(matches!(
		ShortenRequest::new("https://example.com/b")
			.expect("Shorten request should be valid.")
			.with_custom_id(&long_id),
		Err(Error::InvalidRequest { .. })
	));
}
