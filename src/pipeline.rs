//! Sync pipeline
//!
//! extract → classify → report → download images → reconcile
//!
//! Runs once, end to end, in a single task. Nothing is kept between runs
//! except what the portal itself stores.

use crate::assets::{download_expired_assets, AssetSource};
use crate::classifier::classify_all;
use crate::config::{PortalSelectors, Timeouts};
use crate::error::SyncError;
use crate::extractor::extract;
use crate::reconcile::ReconciliationDriver;
use crate::session::{wait_for, PortalPage, Scope};
use crate::storage::AssetStore;
use crate::types::{render_expired_report, ClassifiedRecord, ListingRecord, RunSummary};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Calendar day due dates are compared against
    pub reference_date: NaiveDate,
    /// Stop after downloading images; leave the portal untouched
    pub dry_run: bool,
}

/// Snapshot the listing container and turn it into records.
///
/// Lazy content is forced to render first and the page is put back afterwards,
/// even when the read fails.
pub async fn scrape_listing<P>(
    page: &P,
    selectors: &PortalSelectors,
    timeouts: Timeouts,
) -> Result<Vec<ListingRecord>, SyncError>
where
    P: PortalPage + ?Sized,
{
    page.ensure_fully_rendered().await?;
    let snapshot = read_container(page, selectors, timeouts).await;
    if let Err(e) = page.restore_rendering().await {
        tracing::warn!(error = %e, "could not restore page rendering");
    }
    let html = snapshot?;

    let base = page.current_url().await?;
    let records = extract(&html, &base, selectors)?;
    tracing::info!(count = records.len(), "scraped listing");
    Ok(records)
}

async fn read_container<P>(page: &P, selectors: &PortalSelectors, timeouts: Timeouts) -> Result<String, SyncError>
where
    P: PortalPage + ?Sized,
{
    let css = &selectors.listing_container;
    wait_for(page, Scope::Page, css, timeouts.load, timeouts.poll).await?;
    page.outer_html(Scope::Page, css).await?.ok_or_else(|| SyncError::Timeout {
        what: format!("`{}` to render", css),
        after: timeouts.load,
    })
}

/// Run the whole pipeline against a signed-in page.
pub async fn run_pipeline<P, A>(
    page: &P,
    assets: &A,
    store: &AssetStore,
    selectors: &PortalSelectors,
    timeouts: Timeouts,
    options: PipelineOptions,
) -> Result<RunSummary, SyncError>
where
    P: PortalPage + ?Sized,
    A: AssetSource + ?Sized,
{
    let records = scrape_listing(page, selectors, timeouts).await?;
    let scraped = records.len();

    let classified = classify_all(records, options.reference_date);
    let expired: Vec<&ClassifiedRecord> = classified.iter().filter(|c| c.is_expired).collect();
    tracing::info!(
        expired = expired.len(),
        reference_date = %options.reference_date,
        "classified postings"
    );

    println!("{}", render_expired_report(&classified)?);

    let removed = store.prepare()?;
    if removed > 0 {
        tracing::debug!(removed, dir = %store.dir().display(), "cleared stale images");
    }
    let asset_report = download_expired_assets(assets, store, &expired).await;

    let reconciled = if options.dry_run {
        tracing::info!("dry run, skipping reconciliation");
        0
    } else {
        ReconciliationDriver::new(page, selectors, timeouts)
            .reconcile_all(&expired)
            .await?
    };

    Ok(RunSummary {
        scraped,
        expired: expired.len(),
        assets_written: asset_report.written.len(),
        assets_failed: asset_report.failed,
        reconciled,
    })
}
