//! WebDriver-backed collaborators
//!
//! Connects to a running ChromeDriver, signs in, and exposes the page through
//! the `PortalPage` interface.

pub mod auth;
pub mod webdriver;

pub use webdriver::WebDriverPage;

use anyhow::{Context, Result};
use thirtyfour::prelude::*;

/// Start a Chrome session through the WebDriver server at `webdriver_url`.
pub async fn launch(webdriver_url: &str, headless: bool) -> Result<WebDriver> {
    let mut args = vec![
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--window-size=1920,1080",
        "--disable-blink-features=AutomationControlled",
    ];
    if headless {
        args.push("--headless=new");
        args.push("--disable-gpu");
    }

    let mut caps = DesiredCapabilities::chrome();
    caps.add_chrome_option("args", args)?;

    let driver = WebDriver::new(webdriver_url, caps)
        .await
        .with_context(|| format!("Failed to connect to ChromeDriver at {}", webdriver_url))?;

    tracing::info!(webdriver_url, headless, "browser session started");
    Ok(driver)
}
