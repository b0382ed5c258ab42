use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use internship_sync::assets::SessionHttpClient;
use internship_sync::browser::{self, auth, WebDriverPage};
use internship_sync::config::{
    self, Credentials, PortalSelectors, SyncConfig, Timeouts, DEFAULT_ASSETS_DIR, DEFAULT_PORTAL_URL,
    DEFAULT_WEBDRIVER_URL,
};
use internship_sync::logging;
use internship_sync::pipeline::{run_pipeline, PipelineOptions};
use internship_sync::session::PortalPage;
use internship_sync::storage::AssetStore;
use internship_sync::RunSummary;
use std::path::PathBuf;
use std::time::Duration;
use thirtyfour::WebDriver;

#[derive(Parser, Debug, Clone)]
#[command(name = "internship-sync", version, about = "Move past-due internship postings to the inactive section")]
struct Cli {
    /// Portal page holding the internship listing
    #[arg(long, default_value = DEFAULT_PORTAL_URL)]
    portal_url: String,

    /// ChromeDriver endpoint
    #[arg(long, default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    /// Run Chrome without a window
    #[arg(long, action = ArgAction::SetTrue)]
    headless: bool,

    /// Where images of expired postings are saved (cleared on every run)
    #[arg(long, default_value = DEFAULT_ASSETS_DIR)]
    assets_dir: PathBuf,

    /// YAML file overriding CSS selectors
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Compare due dates against this day instead of today (YYYY-MM-DD)
    #[arg(long)]
    reference_date: Option<String>,

    /// Report and download only; do not touch the portal
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    #[arg(long, default_value_t = 10)]
    step_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    load_timeout_secs: u64,

    /// How long to keep the browser open after a failure
    #[arg(long, default_value_t = 30)]
    failure_pause_secs: u64,

    /// How long to keep the browser open after success
    #[arg(long, default_value_t = 10)]
    linger_secs: u64,

    /// Debug logs
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    /// Build and validate the run configuration. Fails before any browser or
    /// network activity when a secret or flag is unusable.
    fn into_config(self) -> Result<SyncConfig> {
        let credentials = Credentials::from_env()?;
        let portal_url = config::parse_portal_url(&self.portal_url)?;
        let reference_date = self
            .reference_date
            .as_deref()
            .map(config::parse_reference_date)
            .transpose()?;
        let selectors = PortalSelectors::load(self.selectors.as_deref())?;

        Ok(SyncConfig {
            portal_url,
            webdriver_url: self.webdriver_url,
            headless: self.headless,
            credentials,
            assets_dir: self.assets_dir,
            selectors,
            timeouts: Timeouts {
                step: Duration::from_secs(self.step_timeout_secs),
                load: Duration::from_secs(self.load_timeout_secs),
                ..Timeouts::default()
            },
            reference_date,
            dry_run: self.dry_run,
            failure_pause: Duration::from_secs(self.failure_pause_secs),
            linger: Duration::from_secs(self.linger_secs),
        })
    }
}

async fn sync(driver: &WebDriver, config: &SyncConfig) -> Result<RunSummary> {
    auth::sign_in(driver, &config.portal_url, &config.credentials, config.timeouts).await?;

    let page = WebDriverPage::new(driver);
    let cookies = page.session_cookies().await.context("Failed to read session cookies")?;
    let cookie_host = page.current_url().await.context("Failed to read the signed-in page URL")?;
    let user_agent = page.user_agent().await.ok();
    let http = SessionHttpClient::from_cookies(&cookies, &cookie_host, user_agent.as_deref())?;

    let store = AssetStore::new(&config.assets_dir);
    let options = PipelineOptions {
        reference_date: config
            .reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        dry_run: config.dry_run,
    };

    let summary = run_pipeline(&page, &http, &store, &config.selectors, config.timeouts, options).await?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(logging::level_from_verbosity(cli.verbose))?;

    let config = cli.into_config()?;
    let driver = browser::launch(&config.webdriver_url, config.headless).await?;

    let outcome = sync(&driver, &config).await;
    match &outcome {
        Ok(summary) => {
            tracing::info!(%summary, "sync finished");
            tokio::time::sleep(config.linger).await;
        }
        Err(e) => {
            tracing::error!("Error: {:#}", e);
            tracing::info!(
                "keeping the browser open for {}s for inspection",
                config.failure_pause.as_secs()
            );
            tokio::time::sleep(config.failure_pause).await;
        }
    }

    if let Err(e) = driver.quit().await {
        tracing::warn!(error = %e, "failed to quit browser");
    }

    outcome.map(|_| ())
}
