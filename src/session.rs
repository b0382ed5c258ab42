//! Rendering collaborator interface
//!
//! The pipeline never talks to a browser engine directly. It drives a
//! `PortalPage`, which exposes:
//! - element lookup and interaction by CSS selector, scoped to the page or a frame
//! - frame enumeration for nested browsing contexts
//! - modifier + arrow key chords for reordering
//! - a switch that forces lazily rendered content to materialize
//!
//! Bounded waits and frame probing are built on top of that interface here,
//! so they behave the same for every engine.

use crate::error::{SessionError, SyncError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

/// Browsing context an operation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The top-level document
    Page,
    /// The nth frame attached to the top-level document
    Frame(usize),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Page => write!(f, "page"),
            Scope::Frame(i) => write!(f, "frame #{}", i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Control,
    ArrowLeft,
}

#[async_trait]
pub trait PortalPage: Send + Sync {
    /// URL of the top-level document, used to resolve relative links
    async fn current_url(&self) -> Result<Url, SessionError>;

    /// Force lazily rendered content to materialize
    async fn ensure_fully_rendered(&self) -> Result<(), SessionError>;

    /// Undo whatever `ensure_fully_rendered` changed
    async fn restore_rendering(&self) -> Result<(), SessionError>;

    /// Number of elements matching `css` in `scope`
    async fn count(&self, scope: Scope, css: &str) -> Result<usize, SessionError>;

    /// Outer HTML of the first match, if any
    async fn outer_html(&self, scope: Scope, css: &str) -> Result<Option<String>, SessionError>;

    /// Visible text of every match, in document order
    async fn texts(&self, scope: Scope, css: &str) -> Result<Vec<String>, SessionError>;

    /// Number of frames attached to the top-level document
    async fn frame_count(&self) -> Result<usize, SessionError>;

    async fn click(&self, scope: Scope, css: &str, index: usize) -> Result<(), SessionError>;

    /// Clear the field completely, then type `value`
    async fn fill(&self, scope: Scope, css: &str, value: &str) -> Result<(), SessionError>;

    async fn is_checked(&self, scope: Scope, css: &str) -> Result<bool, SessionError>;

    async fn focus(&self, scope: Scope, css: &str, index: usize) -> Result<(), SessionError>;

    /// Press `modifiers`, tap `key`, release the modifiers in reverse order
    async fn send_chord(&self, modifiers: &[Key], key: Key) -> Result<(), SessionError>;
}

/// Poll until `css` matches at least one element in `scope`.
///
/// Lookup errors while polling count as "not there yet". Exceeding `timeout`
/// is fatal for the run.
pub async fn wait_for<P>(
    page: &P,
    scope: Scope,
    css: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<(), SyncError>
where
    P: PortalPage + ?Sized,
{
    wait_for_count(page, scope, css, 1, timeout, poll).await.map(|_| ())
}

/// Poll until `css` matches at least `min` elements in `scope`.
pub async fn wait_for_count<P>(
    page: &P,
    scope: Scope,
    css: &str,
    min: usize,
    timeout: Duration,
    poll: Duration,
) -> Result<usize, SyncError>
where
    P: PortalPage + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        match page.count(scope, css).await {
            Ok(n) if n >= min => return Ok(n),
            Ok(_) => {}
            Err(e) => tracing::debug!(%scope, selector = css, error = %e, "lookup failed while waiting"),
        }
        if Instant::now() >= deadline {
            let what = if min > 1 {
                format!("{} matches of `{}` in {}", min, css, scope)
            } else {
                format!("`{}` in {}", css, scope)
            };
            return Err(SyncError::Timeout { what, after: timeout });
        }
        sleep(poll).await;
    }
}

/// Find the browsing context that currently exposes `css`.
///
/// Candidates are the top-level page followed by every attached frame, probed
/// in order and re-enumerated on each attempt, since frames come and go while
/// a dialog opens. Returns `None` once `timeout` passes without a hit.
pub async fn find_scope_with<P>(
    page: &P,
    css: &str,
    timeout: Duration,
    poll: Duration,
) -> Option<Scope>
where
    P: PortalPage + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        let frames = page.frame_count().await.unwrap_or(0);
        let candidates = std::iter::once(Scope::Page).chain((0..frames).map(Scope::Frame));
        for scope in candidates {
            match page.count(scope, css).await {
                Ok(n) if n > 0 => {
                    tracing::debug!(%scope, selector = css, "found control");
                    return Some(scope);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(%scope, error = %e, "frame probe failed"),
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(poll).await;
    }
}
