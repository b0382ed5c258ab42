//! Run configuration
//!
//! - `Credentials`: the two sign-in secrets, checked before the browser starts
//! - `PortalSelectors`: every CSS selector the extractor and driver rely on
//! - `Timeouts`: bounded waits for page loads and UI steps

use crate::error::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_PORTAL_URL: &str =
    "https://stevens0.sharepoint.com/sites/UndergraduateResearch/SitePages/Summer-Internships.aspx";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_ASSETS_DIR: &str = "inactive_images";

pub const ACCOUNT_ID_VAR: &str = "EMAIL";
pub const ACCOUNT_SECRET_VAR: &str = "PASSWORD";

/// Sign-in secrets for the identity provider.
#[derive(Clone)]
pub struct Credentials {
    pub account_id: String,
    pub account_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("account_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `EMAIL` / `PASSWORD` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingSecret(key))
        };
        Ok(Self {
            account_id: read(ACCOUNT_ID_VAR)?,
            account_secret: read(ACCOUNT_SECRET_VAR)?,
        })
    }
}

/// CSS selectors for the portal page.
///
/// Defaults match the live site. A YAML file may override any subset.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalSelectors {
    /// Container holding the active postings
    pub listing_container: String,
    /// Anchors inside the container, one per posting
    pub listing_anchor: String,
    pub item_title: String,
    pub item_image: String,

    /// Quick-links web part for inactive postings
    pub inactive_region: String,
    /// Matched inside `inactive_region`
    pub add_link_button: String,
    pub from_link_option: String,
    pub url_input: String,
    pub confirm_add_button: String,
    /// Editable label of the entry just created
    pub entry_label_input: String,
    pub new_tab_toggle: String,
    /// Repeating marker, one per entry; matched inside `inactive_region`
    pub position_marker: String,
    /// Marker occurrence assumed to be the new entry when it cannot be told
    /// apart by its label
    pub new_entry_index: usize,
    /// Matched inside `inactive_region`
    pub reorder_button: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            listing_container:
                r#"[data-automation-id="grid-layout"][aria-label*="External Research Internships"]"#.to_string(),
            listing_anchor: r#"[role="listitem"] a[href]"#.to_string(),
            item_title: r#"[data-automation-id="quick-links-item-title"]"#.to_string(),
            item_image: "img".to_string(),

            inactive_region:
                r#"[data-automation-id="grid-layout"][aria-label*="Inactive Research Internships"]"#.to_string(),
            add_link_button: r#"button[data-automation-id="quick-links-add-button"]"#.to_string(),
            from_link_option: r#"button[aria-label="From a link"]"#.to_string(),
            url_input: r#"input[aria-label*="link"]"#.to_string(),
            confirm_add_button: r#"button[data-automation-id="addLinkButton"]"#.to_string(),
            entry_label_input: r#"input[type="text"][id^="TextField"]"#.to_string(),
            new_tab_toggle: r#"button[role="switch"][aria-label*="new tab"]"#.to_string(),
            position_marker: r#"[data-automation-id="quick-links-item"]"#.to_string(),
            new_entry_index: 2,
            reorder_button: r#"button[data-automation-id="reorder-button"]"#.to_string(),
        }
    }
}

impl PortalSelectors {
    /// `css` restricted to descendants of the inactive section.
    pub fn in_inactive_region(&self, css: &str) -> String {
        format!("{} {}", self.inactive_region, css)
    }

    /// Load overrides from a YAML file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Bounded waits used across the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Per UI step in the reconciliation driver
    pub step: Duration,
    /// Sign-in and listing load
    pub load: Duration,
    /// Poll interval inside a bounded wait
    pub poll: Duration,
    /// Looking for the new entry by its label before falling back to
    /// `new_entry_index`
    pub entry_probe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(10),
            load: Duration::from_secs(60),
            poll: Duration::from_millis(250),
            entry_probe: Duration::from_secs(2),
        }
    }
}

/// Everything a sync run needs, validated up front.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub portal_url: Url,
    pub webdriver_url: String,
    pub headless: bool,
    pub credentials: Credentials,
    pub assets_dir: PathBuf,
    pub selectors: PortalSelectors,
    pub timeouts: Timeouts,
    pub reference_date: Option<NaiveDate>,
    pub dry_run: bool,
    pub failure_pause: Duration,
    pub linger: Duration,
}

pub fn parse_portal_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_reference_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate(raw.to_string()))
}
