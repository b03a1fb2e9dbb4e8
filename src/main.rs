//! Linear driver routine: open the browser session, dismiss overlays, run
//! the search, extract every discovered product, then flush the sinks.
//!
//! A run either completes top to bottom or aborts on the first unhandled
//! error; element absences along the way are tolerated and logged.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use supplement_scraper::application::interaction;
use supplement_scraper::application::session::{FieldSelectors, ScrapeSession};
use supplement_scraper::infrastructure::browser::WebDriverSession;
use supplement_scraper::infrastructure::config::{self, AppConfig};
use supplement_scraper::infrastructure::database::RelationalSink;
use supplement_scraper::infrastructure::http_client::HttpImageFetcher;
use supplement_scraper::infrastructure::image_store::ImageStore;
use supplement_scraper::infrastructure::logging::init_logging;
use supplement_scraper::infrastructure::object_store::ObjectStoreClient;
use supplement_scraper::infrastructure::pivot_report;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("scraper_config.json"));

    let config_existed = config_path.exists();
    let config = config::load_or_create(&config_path).await?;
    config.validate()?;
    init_logging(&config.logging, &config.storage.base_path.join("logs"))?;

    if config_existed {
        info!("Loaded configuration from {}", config_path.display());
    } else {
        info!("Created default configuration at {}", config_path.display());
    }
    info!("Starting scrape of {}", config.target.url);
    let driver = WebDriverSession::connect(&config.webdriver, &config.target.url)
        .await
        .context("Failed to open browser session")?;

    let result = run(&driver, &config).await;

    if let Err(e) = driver.quit().await {
        warn!("Failed to close browser session: {e}");
    }
    result
}

async fn run(driver: &WebDriverSession, config: &AppConfig) -> Result<()> {
    let element_wait = Duration::from_secs(config.waits.element_wait_secs);
    let selectors = &config.selectors;

    // Cookie banner, search, then any late popup.
    interaction::dismiss_overlay(driver, "No cookies here !", &selectors.cookie_banner, element_wait)
        .await;
    interaction::search_and_submit(
        driver,
        "No search bar found !!!",
        &selectors.search_input,
        &config.target.search_text,
        element_wait,
    )
    .await;
    interaction::dismiss_overlay(driver, "No pop up found !", &selectors.popup_close, element_wait)
        .await;

    let links = interaction::collect_product_links(driver, &selectors.subcategory_container).await?;

    let store = ImageStore::create(&config.storage.base_path, &config.target.label).await?;
    let fetcher = HttpImageFetcher::new(&config.http)?;

    let field_selectors = FieldSelectors {
        unique_code: selectors.unique_code.clone(),
        quantity_price: selectors.quantity_price.clone(),
        usage: selectors.usage.clone(),
        category: selectors.category.clone(),
        image: selectors.image.clone(),
    };

    let session = ScrapeSession::new(
        driver,
        &fetcher,
        &store,
        Duration::from_secs(config.waits.page_settle_secs),
        config.waits.link_limit,
    );
    let scrape = session.run(&field_selectors, &links).await?;

    store.dump_json(&scrape.table).await?;
    pivot_report::write_pivot_report(store.canonical_dir(), &scrape.table).await?;

    match &config.s3 {
        Some(s3_config) => {
            let object_store = ObjectStoreClient::from_env(s3_config.clone())?;
            object_store.upload_folder(store.upload_dir()).await?;
        }
        None => warn!("No object-store configuration, skipping bucket upload"),
    }

    match &config.database {
        Some(db_config) => {
            let sink = RelationalSink::connect(db_config).await?;
            sink.publish(
                store.label(),
                &scrape.table,
                &scrape.side_index,
                Utc::now().date_naive(),
            )
            .await?;
        }
        None => warn!("No database configuration, skipping relational sink"),
    }

    info!(
        "Run complete: {} record(s), {} image(s) downloaded, {} duplicate(s) skipped",
        scrape.table.len(),
        scrape.downloaded,
        scrape.skipped
    );
    Ok(())
}
