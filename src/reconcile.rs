//! Reconciliation Driver
//!
//! Re-inserts each expired posting into the inactive quick-links section by
//! replaying the same UI steps an editor would:
//!
//! 1. Activate the inactive section and open its "add link" affordance
//! 2. Choose "from a link" and find the frame that exposes the URL input
//! 3. Fill the target link and confirm, scoped to that same frame
//! 4. Overwrite the entry's default label with the posting label
//! 5. Make sure "open in new tab" is on (click only if it is off)
//! 6. Focus the new entry, open reorder, and move it one slot left
//!
//! The new entry is told apart by diffing the section's entry texts before
//! and after the insert. Records are reconciled strictly one after another
//! so each diff sees exactly one new entry. Any bounded wait that runs out
//! ends the run.

use crate::config::{PortalSelectors, Timeouts};
use crate::error::SyncError;
use crate::session::{find_scope_with, wait_for, wait_for_count, Key, PortalPage, Scope};
use crate::types::{ClassifiedRecord, ListingRecord};
use tokio::time::{sleep, Instant};

/// Chord that moves the focused entry one slot left while reordering
const MOVE_LEFT_MODIFIERS: &[Key] = &[Key::Control];
const MOVE_LEFT_KEY: Key = Key::ArrowLeft;

pub struct ReconciliationDriver<'a, P: PortalPage + ?Sized> {
    page: &'a P,
    selectors: &'a PortalSelectors,
    timeouts: Timeouts,
    /// Controls that exist once per quick-links section, narrowed to the
    /// inactive one
    add_link_button: String,
    position_marker: String,
    reorder_button: String,
}

impl<'a, P: PortalPage + ?Sized> ReconciliationDriver<'a, P> {
    pub fn new(page: &'a P, selectors: &'a PortalSelectors, timeouts: Timeouts) -> Self {
        Self {
            page,
            selectors,
            timeouts,
            add_link_button: selectors.in_inactive_region(&selectors.add_link_button),
            position_marker: selectors.in_inactive_region(&selectors.position_marker),
            reorder_button: selectors.in_inactive_region(&selectors.reorder_button),
        }
    }

    async fn wait_on_page(&self, css: &str) -> Result<(), SyncError> {
        wait_for(self.page, Scope::Page, css, self.timeouts.step, self.timeouts.poll).await
    }

    /// Reconcile every expired record in order. Stops at the first failure.
    pub async fn reconcile_all(&self, records: &[&ClassifiedRecord]) -> Result<usize, SyncError> {
        let mut done = 0;
        for (i, classified) in records.iter().enumerate() {
            tracing::info!(
                label = %classified.record.label,
                "reconciling {}/{}",
                i + 1,
                records.len()
            );
            self.reconcile(&classified.record).await?;
            done += 1;
        }
        Ok(done)
    }

    /// Run all six steps for one record.
    pub async fn reconcile(&self, record: &ListingRecord) -> Result<(), SyncError> {
        let before = self.entry_texts().await;
        self.open_add_link().await?;
        let scope = self.open_link_entry().await?;
        self.submit_link(scope, &record.target_link).await?;
        self.overwrite_label(&record.label).await?;
        self.ensure_open_in_new_tab().await?;
        self.reposition(&before, &record.label).await?;
        tracing::debug!(label = %record.label, "entry inserted and repositioned");
        Ok(())
    }

    /// Step 1: activate the inactive section, then its "add link" affordance.
    pub async fn open_add_link(&self) -> Result<(), SyncError> {
        let s = self.selectors;
        self.wait_on_page(&s.inactive_region).await?;
        self.page.click(Scope::Page, &s.inactive_region, 0).await?;

        self.wait_on_page(&self.add_link_button).await?;
        self.page.click(Scope::Page, &self.add_link_button, 0).await?;
        Ok(())
    }

    /// Step 2: pick "from a link" and locate the context holding the URL input.
    pub async fn open_link_entry(&self) -> Result<Scope, SyncError> {
        let s = self.selectors;
        self.wait_on_page(&s.from_link_option).await?;
        self.page.click(Scope::Page, &s.from_link_option, 0).await?;

        find_scope_with(self.page, &s.url_input, self.timeouts.step, self.timeouts.poll)
            .await
            .ok_or(SyncError::FrameNotFound)
    }

    /// Step 3: fill the link and confirm inside the same context as the input.
    pub async fn submit_link(&self, scope: Scope, target_link: &str) -> Result<(), SyncError> {
        let s = self.selectors;
        self.page.fill(scope, &s.url_input, target_link).await?;

        wait_for(self.page, scope, &s.confirm_add_button, self.timeouts.step, self.timeouts.poll).await?;
        self.page.click(scope, &s.confirm_add_button, 0).await?;
        Ok(())
    }

    /// Step 4: replace the auto-filled label with the posting label verbatim.
    pub async fn overwrite_label(&self, label: &str) -> Result<(), SyncError> {
        let s = self.selectors;
        self.wait_on_page(&s.entry_label_input).await?;
        self.page.fill(Scope::Page, &s.entry_label_input, label).await?;
        Ok(())
    }

    /// Step 5: turn "open in new tab" on. Leaves an already-on toggle alone.
    pub async fn ensure_open_in_new_tab(&self) -> Result<(), SyncError> {
        let s = self.selectors;
        self.wait_on_page(&s.new_tab_toggle).await?;
        if self.page.is_checked(Scope::Page, &s.new_tab_toggle).await? {
            tracing::debug!("open in new tab already enabled");
            return Ok(());
        }
        self.page.click(Scope::Page, &s.new_tab_toggle, 0).await?;
        Ok(())
    }

    /// Texts of the position markers; empty when they cannot be read.
    async fn entry_texts(&self) -> Vec<String> {
        match self.page.texts(Scope::Page, &self.position_marker).await {
            Ok(texts) => texts,
            Err(e) => {
                tracing::debug!(error = %e, "could not read entry markers");
                Vec::new()
            }
        }
    }

    /// Step 6: move the freshly inserted entry one position left.
    ///
    /// The new entry is the first marker that differs from `before` and
    /// carries `label`. When no such marker shows up within the entry probe
    /// timeout, the `new_entry_index`-th marker is used instead.
    pub async fn reposition(&self, before: &[String], label: &str) -> Result<(), SyncError> {
        let s = self.selectors;
        let index = match self.locate_new_entry(before, label).await {
            Some(index) => index,
            None => {
                tracing::warn!(label, fallback = s.new_entry_index, "new entry not identified, using fixed position");
                wait_for_count(
                    self.page,
                    Scope::Page,
                    &self.position_marker,
                    s.new_entry_index + 1,
                    self.timeouts.step,
                    self.timeouts.poll,
                )
                .await?;
                s.new_entry_index
            }
        };

        self.page.focus(Scope::Page, &self.position_marker, index).await?;
        self.wait_on_page(&self.reorder_button).await?;
        self.page.click(Scope::Page, &self.reorder_button, 0).await?;
        self.page.send_chord(MOVE_LEFT_MODIFIERS, MOVE_LEFT_KEY).await?;
        Ok(())
    }

    async fn locate_new_entry(&self, before: &[String], label: &str) -> Option<usize> {
        let deadline = Instant::now() + self.timeouts.entry_probe;
        loop {
            if let Some(index) = inserted_index(before, &self.entry_texts().await, label) {
                tracing::debug!(index, "located new entry");
                return Some(index);
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(self.timeouts.poll).await;
        }
    }
}

/// Position of the one entry inserted between two snapshots, provided its
/// text carries `label`.
///
/// The insert point is the first position where the snapshots disagree, or
/// the end when `after` only grew at the tail.
fn inserted_index(before: &[String], after: &[String], label: &str) -> Option<usize> {
    if after.len() <= before.len() {
        return None;
    }
    let at = before
        .iter()
        .zip(after)
        .position(|(b, a)| b != a)
        .unwrap_or(before.len());
    let label = collapse_whitespace(label);
    (!label.is_empty() && collapse_whitespace(&after[at]).contains(&label)).then_some(at)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::{Action, FakePage};
    use std::time::Duration;

    fn fast() -> Timeouts {
        Timeouts {
            step: Duration::from_millis(40),
            load: Duration::from_millis(40),
            poll: Duration::from_millis(5),
            entry_probe: Duration::from_millis(20),
        }
    }

    /// A page where every step's control exists and the URL input lives in frame 1.
    fn ready_page(s: &PortalSelectors, toggle_on: bool) -> FakePage {
        FakePage::new("https://portal.example.edu/SitePages/Internships.aspx")
            .with_frames(2)
            .with_element(Scope::Page, &s.inactive_region)
            .with_element(Scope::Page, &s.in_inactive_region(&s.add_link_button))
            .with_element(Scope::Page, &s.from_link_option)
            .with_element(Scope::Frame(1), &s.url_input)
            .with_element(Scope::Frame(1), &s.confirm_add_button)
            .with_element(Scope::Page, &s.entry_label_input)
            .with_toggle(&s.new_tab_toggle, toggle_on)
            .with_count(Scope::Page, &s.in_inactive_region(&s.position_marker), 4)
            .with_text_snapshots(
                &s.in_inactive_region(&s.position_marker),
                vec![
                    vec!["Program X", "Program Y", "Program Z"],
                    vec!["Program X", "Program Y", "Program A — due Feb. 2, 2024", "Program Z"],
                ],
            )
            .with_element(Scope::Page, &s.in_inactive_region(&s.reorder_button))
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    fn click(scope: Scope, css: &str, index: usize) -> Action {
        Action::Click {
            scope,
            css: css.to_string(),
            index,
        }
    }

    #[tokio::test]
    async fn test_reconcile_issues_full_sequence() {
        let s = PortalSelectors::default();
        let page = ready_page(&s, false);
        let driver = ReconciliationDriver::new(&page, &s, fast());
        let record = ListingRecord::new("Program A — due Feb. 2, 2024", "https://programs.example.org/a", "");

        driver.reconcile(&record).await.unwrap();

        assert_eq!(
            page.actions(),
            vec![
                click(Scope::Page, &s.inactive_region, 0),
                click(Scope::Page, &s.in_inactive_region(&s.add_link_button), 0),
                click(Scope::Page, &s.from_link_option, 0),
                Action::Fill {
                    scope: Scope::Frame(1),
                    css: s.url_input.clone(),
                    value: "https://programs.example.org/a".to_string(),
                },
                click(Scope::Frame(1), &s.confirm_add_button, 0),
                Action::Fill {
                    scope: Scope::Page,
                    css: s.entry_label_input.clone(),
                    value: "Program A — due Feb. 2, 2024".to_string(),
                },
                click(Scope::Page, &s.new_tab_toggle, 0),
                Action::Focus {
                    scope: Scope::Page,
                    css: s.in_inactive_region(&s.position_marker),
                    index: 2,
                },
                click(Scope::Page, &s.in_inactive_region(&s.reorder_button), 0),
                Action::Chord {
                    modifiers: vec![Key::Control],
                    key: Key::ArrowLeft,
                },
            ]
        );
        assert!(page.checked());
    }

    #[tokio::test]
    async fn test_add_link_targets_inactive_section() {
        let s = PortalSelectors::default();
        // both quick-links sections render an add button
        let page = FakePage::new("https://portal.example.edu/")
            .with_element(Scope::Page, &s.inactive_region)
            .with_count(Scope::Page, &s.add_link_button, 2)
            .with_element(Scope::Page, &s.in_inactive_region(&s.add_link_button));
        let driver = ReconciliationDriver::new(&page, &s, fast());

        driver.open_add_link().await.unwrap();

        assert_eq!(
            page.actions(),
            vec![
                click(Scope::Page, &s.inactive_region, 0),
                click(Scope::Page, &s.in_inactive_region(&s.add_link_button), 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_add_link_ignores_listing_section_button() {
        let s = PortalSelectors::default();
        let page = FakePage::new("https://portal.example.edu/")
            .with_element(Scope::Page, &s.inactive_region)
            .with_element(Scope::Page, &s.add_link_button);
        let driver = ReconciliationDriver::new(&page, &s, fast());

        let err = driver.open_add_link().await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        assert_eq!(page.actions(), vec![click(Scope::Page, &s.inactive_region, 0)]);
    }

    #[tokio::test]
    async fn test_confirm_is_scoped_to_input_frame() {
        let s = PortalSelectors::default();
        // confirm button exists only on the outer page, not in the input's frame
        let page = FakePage::new("https://portal.example.edu/")
            .with_frames(1)
            .with_element(Scope::Frame(0), &s.url_input)
            .with_element(Scope::Page, &s.confirm_add_button);
        let driver = ReconciliationDriver::new(&page, &s, fast());

        let err = driver.submit_link(Scope::Frame(0), "https://x.example").await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        assert!(!page
            .actions()
            .iter()
            .any(|a| matches!(a, Action::Click { scope: Scope::Page, .. })));
    }

    #[tokio::test]
    async fn test_toggle_already_checked_is_left_alone() {
        let s = PortalSelectors::default();
        let page = ready_page(&s, true);
        let driver = ReconciliationDriver::new(&page, &s, fast());

        driver.ensure_open_in_new_tab().await.unwrap();
        driver.ensure_open_in_new_tab().await.unwrap();

        assert!(page.checked());
        assert!(page.actions().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_unchecked_is_clicked_once() {
        let s = PortalSelectors::default();
        let page = ready_page(&s, false);
        let driver = ReconciliationDriver::new(&page, &s, fast());

        driver.ensure_open_in_new_tab().await.unwrap();
        driver.ensure_open_in_new_tab().await.unwrap();

        assert!(page.checked());
        assert_eq!(page.actions(), vec![click(Scope::Page, &s.new_tab_toggle, 0)]);
    }

    #[tokio::test]
    async fn test_missing_url_input_reports_frame_error() {
        let s = PortalSelectors::default();
        let page = FakePage::new("https://portal.example.edu/")
            .with_frames(3)
            .with_element(Scope::Page, &s.from_link_option);
        let driver = ReconciliationDriver::new(&page, &s, fast());

        let err = driver.open_link_entry().await.unwrap_err();
        assert!(matches!(err, SyncError::FrameNotFound));
        assert_eq!(err.to_string(), "Could not find the URL input field in any frame");
    }

    #[tokio::test]
    async fn test_missing_add_affordance_times_out() {
        let s = PortalSelectors::default();
        let page = FakePage::new("https://portal.example.edu/").with_element(Scope::Page, &s.inactive_region);
        let driver = ReconciliationDriver::new(&page, &s, fast());

        let err = driver.open_add_link().await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_inserted_index_finds_first_difference() {
        let before = texts(&["A", "B", "C"]);
        assert_eq!(inserted_index(&before, &texts(&["A", "New", "B", "C"]), "New"), Some(1));
        assert_eq!(inserted_index(&before, &texts(&["New", "A", "B", "C"]), "New"), Some(0));
        assert_eq!(inserted_index(&before, &texts(&["A", "B", "C", "New"]), "New"), Some(3));
    }

    #[test]
    fn test_inserted_index_matches_label_loosely() {
        let before = texts(&["A"]);
        let after = texts(&["A", "Program  A\n due Feb. 2, 2024 (opens in new tab)"]);
        assert_eq!(inserted_index(&before, &after, "Program A due Feb. 2, 2024"), Some(1));
    }

    #[test]
    fn test_inserted_index_rejects_unrelated_change() {
        let before = texts(&["A", "B"]);
        assert_eq!(inserted_index(&before, &texts(&["A", "B"]), "New"), None);
        assert_eq!(inserted_index(&before, &texts(&["A", "Other", "B"]), "New"), None);
        assert_eq!(inserted_index(&before, &texts(&["A", "B", "C"]), ""), None);
    }

    #[tokio::test]
    async fn test_reposition_uses_diffed_entry() {
        let s = PortalSelectors::default();
        let page = FakePage::new("https://portal.example.edu/")
            .with_count(Scope::Page, &s.in_inactive_region(&s.position_marker), 4)
            .with_text_snapshots(&s.in_inactive_region(&s.position_marker), vec![vec!["New", "A", "B", "C"]])
            .with_element(Scope::Page, &s.in_inactive_region(&s.reorder_button));
        let driver = ReconciliationDriver::new(&page, &s, fast());

        driver.reposition(&texts(&["A", "B", "C"]), "New").await.unwrap();

        assert_eq!(
            page.actions()[0],
            Action::Focus {
                scope: Scope::Page,
                css: s.in_inactive_region(&s.position_marker),
                index: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_reposition_falls_back_to_fixed_index() {
        let s = PortalSelectors::default();
        let page = FakePage::new("https://portal.example.edu/")
            .with_count(Scope::Page, &s.in_inactive_region(&s.position_marker), 4)
            .with_text_snapshots(&s.in_inactive_region(&s.position_marker), vec![vec!["A", "B", "C"]])
            .with_element(Scope::Page, &s.in_inactive_region(&s.reorder_button));
        let driver = ReconciliationDriver::new(&page, &s, fast());

        driver.reposition(&texts(&["A", "B", "C"]), "New").await.unwrap();

        assert_eq!(
            page.actions()[0],
            Action::Focus {
                scope: Scope::Page,
                css: s.in_inactive_region(&s.position_marker),
                index: s.new_entry_index,
            }
        );
    }

    #[tokio::test]
    async fn test_reposition_fallback_is_bounded_by_entry_probe() {
        let s = PortalSelectors::default();
        let page = FakePage::new("https://portal.example.edu/")
            .with_count(Scope::Page, &s.in_inactive_region(&s.position_marker), 4)
            .with_element(Scope::Page, &s.in_inactive_region(&s.reorder_button));
        let timeouts = Timeouts {
            step: Duration::from_secs(10),
            ..fast()
        };
        let driver = ReconciliationDriver::new(&page, &s, timeouts);

        let started = std::time::Instant::now();
        driver.reposition(&[], "New").await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(page.actions().len(), 3);
    }

    #[tokio::test]
    async fn test_reposition_fallback_waits_for_enough_markers() {
        let s = PortalSelectors::default();
        let page = FakePage::new("https://portal.example.edu/")
            .with_count(Scope::Page, &s.in_inactive_region(&s.position_marker), 2)
            .with_element(Scope::Page, &s.in_inactive_region(&s.reorder_button));
        let driver = ReconciliationDriver::new(&page, &s, fast());

        assert!(matches!(driver.reposition(&[], "New").await, Err(SyncError::Timeout { .. })));
        assert!(page.actions().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_all_stops_at_first_failure() {
        let s = PortalSelectors::default();
        // no frame ever exposes the URL input
        let page = FakePage::new("https://portal.example.edu/")
            .with_element(Scope::Page, &s.inactive_region)
            .with_element(Scope::Page, &s.in_inactive_region(&s.add_link_button))
            .with_element(Scope::Page, &s.from_link_option);
        let driver = ReconciliationDriver::new(&page, &s, fast());

        let records: Vec<ClassifiedRecord> = ["A", "B"]
            .iter()
            .map(|label| ClassifiedRecord {
                record: ListingRecord::new(*label, "https://x.example", ""),
                due_date: None,
                is_expired: true,
            })
            .collect();
        let refs: Vec<&ClassifiedRecord> = records.iter().collect();

        assert!(matches!(driver.reconcile_all(&refs).await, Err(SyncError::FrameNotFound)));
        let add_clicks = page
            .actions()
            .iter()
            .filter(|a| **a == click(Scope::Page, &s.in_inactive_region(&s.add_link_button), 0))
            .count();
        assert_eq!(add_clicks, 1);
    }
}
