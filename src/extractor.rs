//! Listing Extraction
//!
//! Reads a snapshot of the listing container's HTML and turns every posting
//! anchor into a `ListingRecord`. The snapshot is taken once, so later page
//! changes cannot leak into the records of this run.

use crate::config::PortalSelectors;
use crate::error::ConfigError;
use crate::types::ListingRecord;
use scraper::{ElementRef, Html, Selector};
use url::Url;

fn parse_selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|_| ConfigError::InvalidSelector {
        selector: css.to_string(),
    })
}

/// Resolve an attribute value against the page URL, the way `element.href`
/// and `img.src` do in a browser.
fn resolve(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    base.join(raw).ok().map(|u| u.to_string())
}

fn record_from_anchor(
    anchor: ElementRef<'_>,
    base: &Url,
    title: &Selector,
    image: &Selector,
) -> Option<ListingRecord> {
    let href = anchor.value().attr("href")?;
    let target_link = match resolve(base, href) {
        Some(link) => link,
        None => {
            tracing::debug!(href, "dropping anchor with unresolvable href");
            return None;
        }
    };

    let label = anchor
        .select(title)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let image_source = anchor
        .select(image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| resolve(base, src))
        .unwrap_or_default();

    Some(ListingRecord {
        label,
        target_link,
        image_source,
    })
}

/// Extract records from the HTML of the listing container itself.
pub fn extract(
    container_html: &str,
    base: &Url,
    selectors: &PortalSelectors,
) -> Result<Vec<ListingRecord>, ConfigError> {
    let fragment = Html::parse_fragment(container_html);
    let anchors = parse_selector(&selectors.listing_anchor)?;
    let title = parse_selector(&selectors.item_title)?;
    let image = parse_selector(&selectors.item_image)?;

    Ok(fragment
        .select(&anchors)
        .filter_map(|anchor| record_from_anchor(anchor, base, &title, &image))
        .collect())
}

/// Extract records from a whole saved page, reading every listing container
/// it holds.
pub fn extract_from_document(
    document_html: &str,
    base: &Url,
    selectors: &PortalSelectors,
) -> Result<Vec<ListingRecord>, ConfigError> {
    let document = Html::parse_document(document_html);
    let container = parse_selector(&selectors.listing_container)?;
    let anchors = parse_selector(&selectors.listing_anchor)?;
    let title = parse_selector(&selectors.item_title)?;
    let image = parse_selector(&selectors.item_image)?;

    Ok(document
        .select(&container)
        .flat_map(|c| c.select(&anchors))
        .filter_map(|anchor| record_from_anchor(anchor, base, &title, &image))
        .collect())
}
