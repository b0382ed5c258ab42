//! Internship listing sync
//!
//! Scrapes the portal's internship listing, finds postings whose due date has
//! passed, saves their thumbnails, and re-inserts them into the portal's
//! inactive section.

pub mod allocator;
pub mod assets;
pub mod browser;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod pipeline;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod types;

pub use error::{ConfigError, SessionError, SyncError};
pub use types::*;
