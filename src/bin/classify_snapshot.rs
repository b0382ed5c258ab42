//! Snapshot Classifier
//!
//! Classifies a saved copy of the portal page without a browser:
//! - Extracts postings from the listing container with the live selectors
//! - Prints the same JSON report of expired postings as a sync run
//! - Logs the verdict for every posting

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use internship_sync::classifier::classify_all;
use internship_sync::config::{self, PortalSelectors, DEFAULT_PORTAL_URL};
use internship_sync::extractor::extract_from_document;
use internship_sync::{logging, render_expired_report};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "classify_snapshot", about = "Classify postings in a saved portal page")]
struct Args {
    /// Saved HTML of the portal page
    html: PathBuf,

    /// URL the page was saved from, for resolving relative links
    #[arg(long, default_value = DEFAULT_PORTAL_URL)]
    base_url: String,

    /// YAML file overriding CSS selectors
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Compare due dates against this day instead of today (YYYY-MM-DD)
    #[arg(long)]
    reference_date: Option<String>,

    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(logging::level_from_verbosity(args.verbose))?;

    let base = config::parse_portal_url(&args.base_url)?;
    let selectors = PortalSelectors::load(args.selectors.as_deref())?;
    let reference = match args.reference_date.as_deref() {
        Some(raw) => config::parse_reference_date(raw)?,
        None => chrono::Local::now().date_naive(),
    };

    let html = fs::read_to_string(&args.html)
        .with_context(|| format!("Failed to read snapshot from {:?}", args.html))?;
    let records = extract_from_document(&html, &base, &selectors)?;
    if records.is_empty() {
        tracing::warn!("no postings found; check the listing selectors");
    }

    let classified = classify_all(records, reference);
    for c in &classified {
        match c.due_date {
            Some(due) => tracing::info!(label = %c.record.label, %due, expired = c.is_expired, "classified"),
            None => tracing::info!(label = %c.record.label, "no due date, treated as active"),
        }
    }

    println!("{}", render_expired_report(&classified)?);
    Ok(())
}
