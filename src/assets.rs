//! Asset Fetching
//!
//! Downloads the thumbnail of each expired posting through the signed-in
//! session and stores it under a run-unique name.
//!
//! Policy:
//! - One GET per record, no retry
//! - Non-2xx, timeouts and network errors are logged and skipped
//! - Extension comes from the URL suffix, then the content type, then `jpg`

use crate::allocator::FilenameAllocator;
use crate::error::SyncError;
use crate::storage::AssetStore;
use crate::types::{AllocatedAsset, ClassifiedRecord};
use async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use url::Url;

/// Per-request timeout for image downloads
const FETCH_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_EXTENSION: &str = "jpg";

static IMAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)$").expect("image suffix pattern is valid"));

/// Body and declared content type of a fetched resource.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Network-fetch collaborator: authenticated GET of arbitrary URLs.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedAsset, SyncError>;
}

/// Pick a file extension for an image.
///
/// 1. `jpg|jpeg|png|gif|webp` at the end of the URL path (query and fragment
///    ignored), lower-cased
/// 2. `png`, `gif` or `webp` appearing in the content type
/// 3. `jpg`
pub fn determine_extension(url: &str, content_type: Option<&str>) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if let Some(caps) = IMAGE_SUFFIX.captures(path) {
        return caps[1].to_lowercase();
    }

    if let Some(ct) = content_type {
        let ct = ct.to_lowercase();
        for ext in ["png", "gif", "webp"] {
            if ct.contains(ext) {
                return ext.to_string();
            }
        }
    }

    DEFAULT_EXTENSION.to_string()
}

/// Fetch one asset and work out its extension.
pub async fn fetch_asset<A>(source: &A, url: &str) -> Result<(Vec<u8>, String), SyncError>
where
    A: AssetSource + ?Sized,
{
    let fetched = source.get(url).await?;
    let extension = determine_extension(url, fetched.content_type.as_deref());
    Ok((fetched.bytes, extension))
}

/// Outcome of downloading the images of a batch of expired records.
#[derive(Debug, Default)]
pub struct AssetReport {
    pub written: Vec<AllocatedAsset>,
    pub failed: usize,
}

/// Allocate names for every expired record and download the images that exist.
///
/// Names are allocated for each record in order, even those without an image,
/// so a record's name does not depend on whether its neighbours had images.
pub async fn download_expired_assets<A>(
    source: &A,
    store: &AssetStore,
    expired: &[&ClassifiedRecord],
) -> AssetReport
where
    A: AssetSource + ?Sized,
{
    let mut allocator = FilenameAllocator::new();
    let mut report = AssetReport::default();

    for classified in expired {
        let record = &classified.record;
        let base_name = allocator.allocate(&record.label);

        if !record.has_image() {
            tracing::debug!(label = %record.label, "no image to download");
            continue;
        }

        let (bytes, extension) = match fetch_asset(source, &record.image_source).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(label = %record.label, error = %e, "image download failed, skipping");
                report.failed += 1;
                continue;
            }
        };

        let asset = AllocatedAsset { base_name, extension };
        match store.write(&asset, &bytes) {
            Ok(path) => {
                tracing::info!(label = %record.label, path = %path.display(), "saved image");
                report.written.push(asset);
            }
            Err(e) => {
                tracing::warn!(label = %record.label, error = %e, "could not write image, skipping");
                report.failed += 1;
            }
        }
    }

    report
}

/// HTTP client that carries the browser session's cookies.
///
/// Cookies are bound to the portal host only, so images served from other
/// hosts (or reached through a redirect) are requested without them.
pub struct SessionHttpClient {
    client: reqwest::Client,
}

impl SessionHttpClient {
    /// Build a client from `(name, value)` cookie pairs the browser holds for
    /// the page at `portal`.
    pub fn from_cookies(cookies: &[(String, String)], portal: &Url, user_agent: Option<&str>) -> Result<Self, SyncError> {
        Self::with_timeout(cookies, portal, user_agent, Duration::from_secs(FETCH_TIMEOUT_SECS))
    }

    fn with_timeout(
        cookies: &[(String, String)],
        portal: &Url,
        user_agent: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let jar = Jar::default();
        for (name, value) in cookies {
            jar.add_cookie_str(&host_only_cookie(name, value), portal);
        }

        let mut headers = HeaderMap::new();
        if let Some(ua) = user_agent {
            if let Ok(value) = HeaderValue::from_str(ua) {
                headers.insert(USER_AGENT, value);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .cookie_provider(Arc::new(jar))
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::Fetch {
                url: portal.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

/// `Set-Cookie` line without a `Domain` attribute, which pins the cookie to
/// the exact host it is added for.
fn host_only_cookie(name: &str, value: &str) -> String {
    format!("{}={}; Path=/", name, value)
}

#[async_trait]
impl AssetSource for SessionHttpClient {
    async fn get(&self, url: &str) -> Result<FetchedAsset, SyncError> {
        let fetch_error = |reason: String| SyncError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(describe_reqwest_error(&e)))?;

        Ok(FetchedAsset {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}
