//! Fakes for driving the pipeline without a browser or network.

use async_trait::async_trait;
use internship_sync::assets::{AssetSource, FetchedAsset};
use internship_sync::session::{Key, PortalPage, Scope};
use internship_sync::{SessionError, SyncError};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Every interaction the pipeline performed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Click(Scope, String),
    Fill(Scope, String, String),
    Focus(String, usize),
    Chord(Vec<Key>, Key),
}

/// Entries of the inactive section. Writing an entry label inserts it.
struct Section {
    marker_css: String,
    label_css: String,
    insert_at: usize,
    entries: Mutex<Vec<String>>,
}

/// Page that renders a fixed listing and accepts every reconciliation step.
pub struct ScriptedPortal {
    url: Url,
    listing_css: String,
    listing_html: String,
    elements: HashMap<(Scope, String), usize>,
    frames: usize,
    toggle_css: String,
    toggle_on: Mutex<bool>,
    section: Option<Section>,
    log: Mutex<Vec<Interaction>>,
}

impl ScriptedPortal {
    pub fn new(url: &str, listing_css: &str, listing_html: &str, toggle_css: &str) -> Self {
        Self {
            url: Url::parse(url).unwrap(),
            listing_css: listing_css.to_string(),
            listing_html: listing_html.to_string(),
            elements: HashMap::new(),
            frames: 0,
            toggle_css: toggle_css.to_string(),
            toggle_on: Mutex::new(false),
            section: None,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn element(mut self, scope: Scope, css: &str, count: usize) -> Self {
        self.elements.insert((scope, css.to_string()), count);
        self
    }

    /// Existing entries of the inactive section; new entries land at `insert_at`.
    pub fn section(mut self, marker_css: &str, label_css: &str, entries: &[&str], insert_at: usize) -> Self {
        self.section = Some(Section {
            marker_css: marker_css.to_string(),
            label_css: label_css.to_string(),
            insert_at,
            entries: Mutex::new(entries.iter().map(|e| e.to_string()).collect()),
        });
        self
    }

    pub fn frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.log.lock().unwrap().clone()
    }

    fn lookup(&self, scope: Scope, css: &str) -> usize {
        if scope == Scope::Page && css == self.listing_css {
            return 1;
        }
        if scope == Scope::Page && css == self.toggle_css {
            return 1;
        }
        if let Some(section) = self.section.as_ref().filter(|s| scope == Scope::Page && css == s.marker_css) {
            return section.entries.lock().unwrap().len();
        }
        self.elements.get(&(scope, css.to_string())).copied().unwrap_or(0)
    }

    fn require(&self, scope: Scope, css: &str, index: usize) -> Result<(), SessionError> {
        if index < self.lookup(scope, css) {
            Ok(())
        } else {
            Err(SessionError::ElementNotFound {
                selector: css.to_string(),
                index,
            })
        }
    }
}

#[async_trait]
impl PortalPage for ScriptedPortal {
    async fn current_url(&self) -> Result<Url, SessionError> {
        Ok(self.url.clone())
    }

    async fn ensure_fully_rendered(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn restore_rendering(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn count(&self, scope: Scope, css: &str) -> Result<usize, SessionError> {
        Ok(self.lookup(scope, css))
    }

    async fn outer_html(&self, scope: Scope, css: &str) -> Result<Option<String>, SessionError> {
        if scope == Scope::Page && css == self.listing_css {
            Ok(Some(self.listing_html.clone()))
        } else {
            Ok(None)
        }
    }

    async fn texts(&self, scope: Scope, css: &str) -> Result<Vec<String>, SessionError> {
        match &self.section {
            Some(section) if scope == Scope::Page && css == section.marker_css => {
                Ok(section.entries.lock().unwrap().clone())
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn frame_count(&self) -> Result<usize, SessionError> {
        Ok(self.frames)
    }

    async fn click(&self, scope: Scope, css: &str, index: usize) -> Result<(), SessionError> {
        self.require(scope, css, index)?;
        if css == self.toggle_css {
            let mut on = self.toggle_on.lock().unwrap();
            *on = !*on;
        }
        self.log.lock().unwrap().push(Interaction::Click(scope, css.to_string()));
        Ok(())
    }

    async fn fill(&self, scope: Scope, css: &str, value: &str) -> Result<(), SessionError> {
        self.require(scope, css, 0)?;
        if let Some(section) = self.section.as_ref().filter(|s| scope == Scope::Page && css == s.label_css) {
            let mut entries = section.entries.lock().unwrap();
            let at = section.insert_at.min(entries.len());
            entries.insert(at, value.to_string());
        }
        self.log
            .lock()
            .unwrap()
            .push(Interaction::Fill(scope, css.to_string(), value.to_string()));
        Ok(())
    }

    async fn is_checked(&self, _scope: Scope, _css: &str) -> Result<bool, SessionError> {
        Ok(*self.toggle_on.lock().unwrap())
    }

    async fn focus(&self, scope: Scope, css: &str, index: usize) -> Result<(), SessionError> {
        self.require(scope, css, index)?;
        self.log.lock().unwrap().push(Interaction::Focus(css.to_string(), index));
        Ok(())
    }

    async fn send_chord(&self, modifiers: &[Key], key: Key) -> Result<(), SessionError> {
        self.log.lock().unwrap().push(Interaction::Chord(modifiers.to_vec(), key));
        Ok(())
    }
}

/// Asset source serving canned bytes; unknown URLs fail like a 404.
pub struct CannedAssets {
    assets: HashMap<String, FetchedAsset>,
    pub requests: Mutex<Vec<String>>,
}

impl CannedAssets {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn serve(mut self, url: &str, content_type: Option<&str>, bytes: &[u8]) -> Self {
        self.assets.insert(
            url.to_string(),
            FetchedAsset {
                content_type: content_type.map(str::to_string),
                bytes: bytes.to_vec(),
            },
        );
        self
    }
}

#[async_trait]
impl AssetSource for CannedAssets {
    async fn get(&self, url: &str) -> Result<FetchedAsset, SyncError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.assets.get(url).cloned().ok_or_else(|| SyncError::Fetch {
            url: url.to_string(),
            reason: "HTTP 404".to_string(),
        })
    }
}
