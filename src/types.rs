use chrono::NaiveDate;
use serde::Serialize;

/// One posting scraped from the listing container.
///
/// Field names serialize the way the console report has always printed them
/// (`Text`, `Link`, `Img`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    #[serde(rename = "Text")]
    pub label: String,
    #[serde(rename = "Link")]
    pub target_link: String,
    /// Empty when the posting has no thumbnail.
    #[serde(rename = "Img")]
    pub image_source: String,
}

impl ListingRecord {
    pub fn new(label: impl Into<String>, target_link: impl Into<String>, image_source: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target_link: target_link.into(),
            image_source: image_source.into(),
        }
    }

    pub fn has_image(&self) -> bool {
        !self.image_source.is_empty()
    }
}

/// A record annotated with its parsed due date and expiry verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: ListingRecord,
    pub due_date: Option<NaiveDate>,
    /// Never true when `due_date` is `None`.
    pub is_expired: bool,
}

/// File name chosen for an expired record's image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocatedAsset {
    pub base_name: String,
    pub extension: String,
}

impl AllocatedAsset {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.base_name, self.extension)
    }
}

/// Counters logged at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scraped: usize,
    pub expired: usize,
    pub assets_written: usize,
    pub assets_failed: usize,
    pub reconciled: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scraped={} expired={} assets_written={} assets_failed={} reconciled={}",
            self.scraped, self.expired, self.assets_written, self.assets_failed, self.reconciled
        )
    }
}

/// Render the expired records as the pretty-printed JSON report.
pub fn render_expired_report(classified: &[ClassifiedRecord]) -> Result<String, serde_json::Error> {
    let expired: Vec<&ListingRecord> = classified
        .iter()
        .filter(|c| c.is_expired)
        .map(|c| &c.record)
        .collect();
    serde_json::to_string_pretty(&expired)
}
