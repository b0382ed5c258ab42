//! Typed errors for the sync library.
//!
//! Three tiers show up here:
//! - Per-record failures (`Fetch`) are logged by the caller and skipped
//! - Run-level failures (`Timeout`, `FrameNotFound`, `Session`) abort the run
//! - Unparseable due dates never become errors at all

use std::time::Duration;
use thiserror::Error;

/// Failures reported by the rendering collaborator (the live browser page).
#[derive(Debug, Error)]
pub enum SessionError {
    /// No element matched the selector in the requested scope
    #[error("no element matches `{selector}` (index {index})")]
    ElementNotFound { selector: String, index: usize },

    /// The underlying WebDriver call failed
    #[error("webdriver error: {0}")]
    WebDriver(String),

    /// A script evaluated in the page failed or returned garbage
    #[error("script error: {0}")]
    Script(String),
}

/// Configuration problems, detected before any network interaction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secret `{0}` (set it in the environment or .env)")]
    MissingSecret(&'static str),

    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid CSS selector `{selector}`")]
    InvalidSelector { selector: String },

    #[error("invalid reference date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("failed to read selectors file: {0}")]
    SelectorsFile(#[from] std::io::Error),

    #[error("failed to parse selectors YAML: {0}")]
    SelectorsYaml(#[from] serde_yaml::Error),
}

/// Errors raised while running the synchronization pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A bounded wait for a UI affordance ran out
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// Link-entry surface never exposed its URL input
    #[error("Could not find the URL input field in any frame")]
    FrameNotFound,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Asset download failed (one record only)
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

impl SyncError {
    /// True for errors that end the whole run rather than a single record.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Fetch { .. })
    }
}
