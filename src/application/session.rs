//! Extraction workflow.
//!
//! For each product link: navigate, settle, extract the five fields
//! independently (each attempt isolated, sentinel-filled on absence), then
//! run the dedup/persistence gate synchronously before moving on. One
//! record per link, accumulated into the column-oriented table. Strictly
//! sequential: one browser session, one record at a time.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::record::{
    artifact_key, friendly_id, FieldOutcome, ProductRecord, ProductTable, QuantityPrice,
    SideIndex, CATEGORY_SENTINEL, UNIQUE_CODE_SENTINEL, USAGE_SENTINEL,
};
use crate::infrastructure::browser::{BrowserError, PageDriver};
use crate::infrastructure::http_client::ImageFetcher;
use crate::infrastructure::image_store::{DedupOutcome, ImageStore};

/// XPath locators for the five per-product fields.
#[derive(Debug, Clone)]
pub struct FieldSelectors {
    pub unique_code: String,
    pub quantity_price: String,
    pub usage: String,
    pub category: String,
    pub image: String,
}

/// Everything a finished extraction run produces.
#[derive(Debug)]
pub struct ScrapeRun {
    pub table: ProductTable,
    pub side_index: SideIndex,
    pub downloaded: usize,
    pub skipped: usize,
}

/// Session-scoped orchestration of extraction plus dedup/persistence.
pub struct ScrapeSession<'a> {
    driver: &'a dyn PageDriver,
    fetcher: &'a dyn ImageFetcher,
    store: &'a ImageStore,
    page_settle: Duration,
    link_limit: Option<usize>,
}

impl<'a> ScrapeSession<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        fetcher: &'a dyn ImageFetcher,
        store: &'a ImageStore,
        page_settle: Duration,
        link_limit: Option<usize>,
    ) -> Self {
        Self {
            driver,
            fetcher,
            store,
            page_settle,
            link_limit,
        }
    }

    /// One isolated field-extraction attempt: element text.
    async fn extract_text(&self, xpath: &str) -> FieldOutcome {
        match self.driver.find_text(xpath).await {
            Ok(text) => FieldOutcome::Found(text),
            Err(BrowserError::NoSuchElement(_)) => FieldOutcome::Missing,
            Err(BrowserError::Transport(e)) => FieldOutcome::Failed(e),
        }
    }

    /// One isolated field-extraction attempt: element attribute.
    async fn extract_attr(&self, xpath: &str, attr: &str) -> FieldOutcome {
        match self.driver.find_attr(xpath, attr).await {
            Ok(Some(value)) => FieldOutcome::Found(value),
            Ok(None) => FieldOutcome::Missing,
            Err(BrowserError::NoSuchElement(_)) => FieldOutcome::Missing,
            Err(BrowserError::Transport(e)) => FieldOutcome::Failed(e),
        }
    }

    /// Process the discovered links (bounded by the configured limit) and
    /// return the accumulated table, side index and dedup counts.
    pub async fn run(&self, selectors: &FieldSelectors, links: &[String]) -> Result<ScrapeRun> {
        let bound = self
            .link_limit
            .unwrap_or(links.len())
            .min(links.len());

        let mut table = ProductTable::default();
        let mut side_index = SideIndex::default();
        let mut downloaded = 0;
        let mut skipped = 0;

        for link in &links[..bound] {
            self.driver
                .goto(link)
                .await
                .map_err(|e| anyhow::anyhow!("Navigation to {link} failed: {e}"))?;
            sleep(self.page_settle).await;

            let uuid_secondary = Uuid::new_v4().to_string();

            let unique_code = self.extract_text(&selectors.unique_code).await;
            let quantity_price = self.extract_text(&selectors.quantity_price).await;
            let usage = self.extract_text(&selectors.usage).await;
            let category = self.extract_text(&selectors.category).await;
            let image_src = self.extract_attr(&selectors.image, "src").await;

            let record = ProductRecord {
                link: link.clone(),
                uuid_primary: unique_code.value_or(UNIQUE_CODE_SENTINEL),
                uuid_secondary,
                quantity_and_price: QuantityPrice::from_outcome(&quantity_price),
                usage: usage.value_or(USAGE_SENTINEL),
                product_category: category.value_or(CATEGORY_SENTINEL),
            };

            match image_src {
                FieldOutcome::Found(src) => {
                    let key = artifact_key(&record.uuid_primary, &record.product_category);
                    let outcome = self
                        .store
                        .persist(self.fetcher, &key, &src, &record.uuid_secondary)
                        .await
                        .with_context(|| format!("Image persistence failed for {link}"))?;
                    match outcome {
                        DedupOutcome::Downloaded => {
                            downloaded += 1;
                            side_index.push(key, friendly_id());
                        }
                        DedupOutcome::Skipped => skipped += 1,
                    }
                }
                FieldOutcome::Missing => {
                    warn!("No image element on {link}, skipping download");
                }
                FieldOutcome::Failed(e) => {
                    warn!("Image lookup errored on {link} ({e}), skipping download");
                }
            }

            table.push(record);
        }

        info!(
            "Extraction finished: {} record(s), {} downloaded, {} skipped",
            table.len(),
            downloaded,
            skipped
        );

        Ok(ScrapeRun {
            table,
            side_index,
            downloaded,
            skipped,
        })
    }
}
