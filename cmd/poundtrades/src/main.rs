//! # PoundTrades Binary
//!
//! The composition root: loads settings, wires the adapters into the
//! catalog service, subscribes the service to the change and auth feeds,
//! and renders a storefront snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use auth_adapters::LocalSessions;
use domains::{AuthSessions, ListingSource, QuerySpec};
use services::{CatalogService, CatalogTuning};
use storage_adapters::{LocalMediaStore, SqliteListingSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = configs::Settings::load().context("loading settings")?;

    // 1. Listing source
    let source = Arc::new(
        SqliteListingSource::new(&settings.remote.database_url)
            .await
            .context("opening catalog database")?,
    );

    // 2. Media storage
    let media = Arc::new(
        LocalMediaStore::new(
            PathBuf::from(&settings.media.root),
            settings.media.url_prefix.clone(),
        )
        .with_limits(settings.media.max_width, settings.media.jpeg_quality),
    );

    // 3. Sessions
    let sessions = Arc::new(LocalSessions::new());

    // 4. Catalog service (dynamic dispatch for maximum flexibility)
    let tuning = CatalogTuning {
        ttl: settings.cache.ttl_secs.map(Duration::from_secs),
        max_entries: settings.cache.max_entries,
        remote_timeout: Duration::from_millis(settings.remote.timeout_ms),
    };
    let catalog = Arc::new(CatalogService::new(source.clone(), media, tuning));
    catalog.clone().spawn_change_listener(source.subscribe());
    catalog.clone().spawn_auth_listener(sessions.subscribe());

    // 5. Storefront snapshot
    let categories = catalog.categories().await.context("loading categories")?;
    tracing::info!(
        count = categories.len() - 1,
        "categories loaded (plus the synthetic All)"
    );

    let feed = catalog.fetch(&QuerySpec::all()).await;
    if let Some(err) = &feed.error {
        tracing::warn!(%err, "home feed degraded");
    }
    tracing::info!(listings = feed.listings.len(), "home feed ready");
    for listing in feed.listings.iter().take(10) {
        tracing::info!(
            title = %listing.title,
            price = %format_args!("£{}.{:02}", listing.price_pence / 100, listing.price_pence % 100),
            location = listing.location.as_deref().unwrap_or("-"),
            "listing"
        );
    }

    Ok(())
}
