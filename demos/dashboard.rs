//! Walks through a dashboard session against a mock shortener backend: list links, recover
//! from an expired credential with one refresh, then lose the session and observe the signal.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use shurl_client::{
	api::{ReqwestDispatcher, SessionInvalidated, ShortenRequest},
	auth::{Credential, Principal, PrincipalId},
	config::ClientConfig,
	session::{CredentialSource, MemoryCredentialSource},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/u/shortlinks").header("authorization", "Bearer expired");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/u/shortlinks").header("authorization", "Bearer fresh");
			then.status(200).header("content-type", "application/json").body(
				"[{\"short_id\":\"docs\",\"url\":\"https://example.com/docs\",\"is_private\":false}]",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/u/shorten");
			then.status(401);
		})
		.await;

	let principal = Principal::new(PrincipalId::new("demo-user")?)
		.with_email("demo@example.com", true)
		.with_display_name("Demo User");
	let source = MemoryCredentialSource::signed_in(principal, Credential::new("expired"));
	let _subscription = source.on_identity_change(Box::new(|principal| match principal {
		Some(principal) => println!("identity: signed in as {}", principal.label()),
		None => println!("identity: signed out"),
	}));

	source.queue_refresh(Credential::new("fresh"));

	let config = ClientConfig::builder()
		.base_url(server.base_url())
		.short_hostname("localhost:8080")
		.build()?;
	let observer = |event: &SessionInvalidated| {
		println!(
			"session ended ({}) on {} {}; redirecting to {}",
			event.reason, event.method, event.path, event.redirect_to
		);
	};
	let dispatcher =
		ReqwestDispatcher::new(config, Arc::new(source.clone()))?.with_observer(Arc::new(observer));

	for link in dispatcher.short_links().await? {
		let short_url = dispatcher.short_url(&link.short_id).map(String::from).unwrap_or_default();

		println!("{short_url} -> {}", link.url);
	}

	// The staged refresh is used up, so the next rejection ends the session.
	let request = ShortenRequest::new("https://example.com/changelog")?;

	if let Err(e) = dispatcher.shorten(&request).await {
		println!("shorten failed: {e}");
	}

	println!(
		"requests={} refreshes={} invalidations={} signed_in={}",
		dispatcher.metrics.requests(),
		dispatcher.metrics.refreshes(),
		dispatcher.metrics.invalidations(),
		source.has_principal()
	);

	Ok(())
}
