//! Portal sign-in
//!
//! Drives the identity provider's two-page form and the push-notification
//! challenge, then waits for the portal heading to confirm the session is
//! signed in and loaded. Approving the push is up to the user.

use crate::config::{Credentials, Timeouts};
use anyhow::{Context, Result};
use std::time::Duration;
use thirtyfour::prelude::*;
use url::Url;

const ACCOUNT_ID_INPUT: &str = "#i0116";
const ACCOUNT_ID_NEXT: &str = "#idSIButton9";
const SECRET_INPUT: &str = "#input28";
const SECRET_SUBMIT: &str = r#"input[type="submit"][value="Verify"]"#;
const PUSH_CHALLENGE: &str = r#"a[aria-label*="push notification to the Okta Verify app"]"#;

/// Text that only shows up once the portal page has loaded
pub const LOADED_MARKER_TEXT: &str = "Summer Research Internships";

/// Pause between filling a field and submitting it
const FIELD_SETTLE: Duration = Duration::from_secs(1);

async fn wait_css(driver: &WebDriver, css: &str, timeout: Duration, poll: Duration) -> Result<WebElement> {
    driver
        .query(By::Css(css))
        .wait(timeout, poll)
        .first()
        .await
        .with_context(|| format!("Timed out waiting for `{}`", css))
}

pub async fn sign_in(driver: &WebDriver, portal_url: &Url, credentials: &Credentials, timeouts: Timeouts) -> Result<()> {
    driver
        .goto(portal_url.as_str())
        .await
        .context("Failed to navigate to portal")?;

    tracing::info!("entering account id");
    let account_field = wait_css(driver, ACCOUNT_ID_INPUT, timeouts.load, timeouts.poll).await?;
    account_field.send_keys(&credentials.account_id).await?;
    tokio::time::sleep(FIELD_SETTLE).await;
    wait_css(driver, ACCOUNT_ID_NEXT, timeouts.step, timeouts.poll)
        .await?
        .click()
        .await?;

    tracing::info!("entering password");
    let secret_field = wait_css(driver, SECRET_INPUT, timeouts.load, timeouts.poll).await?;
    secret_field.send_keys(&credentials.account_secret).await?;
    tokio::time::sleep(FIELD_SETTLE).await;
    wait_css(driver, SECRET_SUBMIT, timeouts.step, timeouts.poll)
        .await?
        .click()
        .await?;

    tracing::info!("requesting push notification, approve it on your device");
    wait_css(driver, PUSH_CHALLENGE, timeouts.load, timeouts.poll)
        .await?
        .click()
        .await?;

    let marker = format!("//*[contains(text(), '{}')]", LOADED_MARKER_TEXT);
    driver
        .query(By::XPath(&marker))
        .wait(timeouts.load, timeouts.poll)
        .first()
        .await
        .context("Portal did not finish loading after sign-in")?;

    tracing::info!("signed in");
    Ok(())
}
