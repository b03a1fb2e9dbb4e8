//! End-to-end workflow tests over an in-memory page driver: field
//! isolation, dedup idempotence, side-index accounting, and the bounded
//! interaction helpers.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

use supplement_scraper::application::interaction;
use supplement_scraper::application::session::{FieldSelectors, ScrapeSession};
use supplement_scraper::domain::record::{
    ProductTable, QuantityPrice, CATEGORY_SENTINEL, QUANTITY_PRICE_SENTINEL,
    UNIQUE_CODE_SENTINEL, USAGE_SENTINEL,
};
use supplement_scraper::infrastructure::browser::{BrowserError, BrowserResult, PageDriver};
use supplement_scraper::infrastructure::http_client::ImageFetcher;
use supplement_scraper::infrastructure::image_store::ImageStore;

// ---- fakes -------------------------------------------------------------

#[derive(Default, Clone)]
struct FakePage {
    texts: HashMap<String, String>,
    attrs: HashMap<(String, String), String>,
}

impl FakePage {
    fn with_text(mut self, xpath: &str, text: &str) -> Self {
        self.texts.insert(xpath.to_string(), text.to_string());
        self
    }

    fn with_attr(mut self, xpath: &str, attr: &str, value: &str) -> Self {
        self.attrs
            .insert((xpath.to_string(), attr.to_string()), value.to_string());
        self
    }
}

#[derive(Default)]
struct FakeDriver {
    pages: HashMap<String, FakePage>,
    clickable: Vec<String>,
    containers: HashMap<String, Vec<String>>,
    current: Mutex<String>,
}

impl FakeDriver {
    fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    fn with_clickable(mut self, xpath: &str) -> Self {
        self.clickable.push(xpath.to_string());
        self
    }

    fn with_container(mut self, xpath: &str, links: &[&str]) -> Self {
        self.containers.insert(
            xpath.to_string(),
            links.iter().map(ToString::to_string).collect(),
        );
        self
    }

    fn current_page(&self) -> FakePage {
        let url = self.current.lock().unwrap().clone();
        self.pages.get(&url).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        *self.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn maximize(&self) -> BrowserResult<()> {
        Ok(())
    }

    async fn find_text(&self, xpath: &str) -> BrowserResult<String> {
        self.current_page()
            .texts
            .get(xpath)
            .cloned()
            .ok_or_else(|| BrowserError::NoSuchElement(xpath.to_string()))
    }

    async fn find_attr(&self, xpath: &str, attr: &str) -> BrowserResult<Option<String>> {
        let page = self.current_page();
        if page.attrs.contains_key(&(xpath.to_string(), attr.to_string()))
            || page.texts.contains_key(xpath)
        {
            Ok(page.attrs.get(&(xpath.to_string(), attr.to_string())).cloned())
        } else {
            Err(BrowserError::NoSuchElement(xpath.to_string()))
        }
    }

    async fn click(&self, xpath: &str) -> BrowserResult<()> {
        if self.clickable.iter().any(|c| c == xpath) {
            Ok(())
        } else {
            Err(BrowserError::NoSuchElement(xpath.to_string()))
        }
    }

    async fn type_and_submit(&self, xpath: &str, _text: &str) -> BrowserResult<()> {
        self.click(xpath).await
    }

    async fn child_link_hrefs(&self, container_xpath: &str) -> BrowserResult<Vec<String>> {
        self.containers
            .get(container_xpath)
            .cloned()
            .ok_or_else(|| BrowserError::NoSuchElement(container_xpath.to_string()))
    }
}

struct CountingFetcher {
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn downloads(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"\xFF\xD8\xFFfake-jpeg".to_vec())
    }
}

// ---- fixtures ----------------------------------------------------------

fn selectors() -> FieldSelectors {
    FieldSelectors {
        unique_code: "//h1".to_string(),
        quantity_price: "//div[@price]".to_string(),
        usage: "//div[@usage]".to_string(),
        category: "//span[@cat]".to_string(),
        image: "//img".to_string(),
    }
}

fn full_page(code: &str, category: &str, img: &str) -> FakePage {
    FakePage::default()
        .with_text("//h1", code)
        .with_text("//div[@price]", "90 tablets £11.50")
        .with_text("//div[@usage]", "One tablet daily")
        .with_text("//span[@cat]", category)
        .with_attr("//img", "src", img)
}

fn settle() -> Duration {
    Duration::from_millis(0)
}

// ---- extraction workflow ----------------------------------------------

#[tokio::test]
async fn missing_image_still_yields_full_record_but_no_download() -> Result<()> {
    let dir = tempdir()?;
    let store = ImageStore::create(dir.path(), "store").await?;
    let fetcher = CountingFetcher::new();

    let page_without_image = FakePage::default()
        .with_text("//h1", "7702-60")
        .with_text("//div[@price]", "60 caps £8.25")
        .with_text("//div[@usage]", "Two daily")
        .with_text("//span[@cat]", "Magnesium");

    let driver = FakeDriver::default()
        .with_page(
            "https://shop.test/a",
            full_page("8526-90", "Vitamin C", "https://img.test/a.jpg"),
        )
        .with_page("https://shop.test/b", page_without_image);

    let links = vec![
        "https://shop.test/a".to_string(),
        "https://shop.test/b".to_string(),
    ];

    let session = ScrapeSession::new(&driver, &fetcher, &store, settle(), None);
    let run = session.run(&selectors(), &links).await?;

    assert_eq!(run.table.len(), 2);
    assert_eq!(run.downloaded, 1);
    assert_eq!(run.skipped, 0);
    assert_eq!(run.side_index.len(), 1);
    assert_eq!(fetcher.downloads(), 1);

    // Both records are complete; the second simply never entered the gate.
    assert_eq!(run.table.uuid1[1], "7702-60");
    assert_eq!(run.table.product_category[1], "Magnesium");
    assert!(store.contains("8526-90_Vitamin C"));
    assert!(!store.contains("7702-60_Magnesium"));

    let upload_count = std::fs::read_dir(store.upload_dir())?.count();
    assert_eq!(upload_count, 1);
    Ok(())
}

#[tokio::test]
async fn rerun_over_unchanged_pages_downloads_nothing() -> Result<()> {
    let dir = tempdir()?;
    let store = ImageStore::create(dir.path(), "store").await?;

    let driver = FakeDriver::default()
        .with_page(
            "https://shop.test/a",
            full_page("8526-90", "Vitamin C", "https://img.test/a.jpg"),
        )
        .with_page(
            "https://shop.test/b",
            full_page("8066-120", "Turmeric", "https://img.test/b.jpg"),
        );
    let links = vec![
        "https://shop.test/a".to_string(),
        "https://shop.test/b".to_string(),
    ];

    let first_fetcher = CountingFetcher::new();
    let first = ScrapeSession::new(&driver, &first_fetcher, &store, settle(), None)
        .run(&selectors(), &links)
        .await?;
    assert_eq!(first.downloaded, 2);
    assert_eq!(first.side_index.len(), 2);

    let canonical_count = std::fs::read_dir(store.canonical_dir())?.count();

    let second_fetcher = CountingFetcher::new();
    let second = ScrapeSession::new(&driver, &second_fetcher, &store, settle(), None)
        .run(&selectors(), &links)
        .await?;

    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 2);
    assert!(second.side_index.is_empty());
    assert_eq!(second_fetcher.downloads(), 0);
    // Canonical folder untouched by the second run.
    assert_eq!(
        std::fs::read_dir(store.canonical_dir())?.count(),
        canonical_count
    );
    // But the table still has all records.
    assert_eq!(second.table.len(), 2);
    Ok(())
}

#[tokio::test]
async fn absent_fields_are_sentinel_filled() -> Result<()> {
    let dir = tempdir()?;
    let store = ImageStore::create(dir.path(), "store").await?;
    let fetcher = CountingFetcher::new();

    let driver =
        FakeDriver::default().with_page("https://shop.test/empty", FakePage::default());
    let links = vec!["https://shop.test/empty".to_string()];

    let run = ScrapeSession::new(&driver, &fetcher, &store, settle(), None)
        .run(&selectors(), &links)
        .await?;

    assert_eq!(run.table.len(), 1);
    assert_eq!(run.table.uuid1[0], UNIQUE_CODE_SENTINEL);
    assert_eq!(run.table.usage[0], USAGE_SENTINEL);
    assert_eq!(run.table.product_category[0], CATEGORY_SENTINEL);
    assert_eq!(
        run.table.quantity_and_price[0],
        QuantityPrice::Sentinel(QUANTITY_PRICE_SENTINEL.to_string())
    );
    // The generated secondary id is still present and unique per record.
    assert_eq!(run.table.uuid4[0].len(), 36);
    assert_eq!(run.downloaded, 0);
    Ok(())
}

#[tokio::test]
async fn link_limit_bounds_the_run() -> Result<()> {
    let dir = tempdir()?;
    let store = ImageStore::create(dir.path(), "store").await?;
    let fetcher = CountingFetcher::new();

    let mut driver = FakeDriver::default();
    let mut links = Vec::new();
    for i in 0..3 {
        let url = format!("https://shop.test/{i}");
        driver = driver.with_page(
            &url,
            full_page(&format!("code-{i}"), "Fish Oils", &format!("https://img.test/{i}.jpg")),
        );
        links.push(url);
    }

    // Historical compatibility mode: first two links only.
    let run = ScrapeSession::new(&driver, &fetcher, &store, settle(), Some(2))
        .run(&selectors(), &links)
        .await?;
    assert_eq!(run.table.len(), 2);

    // A limit beyond the list processes everything that exists.
    let run_all = ScrapeSession::new(&driver, &fetcher, &store, settle(), Some(10))
        .run(&selectors(), &links)
        .await?;
    assert_eq!(run_all.table.len(), 3);
    Ok(())
}

#[tokio::test]
async fn dump_round_trips_the_run_table() -> Result<()> {
    let dir = tempdir()?;
    let store = ImageStore::create(dir.path(), "store").await?;
    let fetcher = CountingFetcher::new();

    let driver = FakeDriver::default().with_page(
        "https://shop.test/a",
        full_page("8526-90", "Vitamin C", "https://img.test/a.jpg"),
    );
    let run = ScrapeSession::new(&driver, &fetcher, &store, settle(), None)
        .run(&selectors(), &["https://shop.test/a".to_string()])
        .await?;

    let path = store.dump_json(&run.table).await?;
    let parsed: ProductTable = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    assert_eq!(parsed, run.table);
    Ok(())
}

// ---- interaction layer -------------------------------------------------

#[tokio::test]
async fn bootstrap_calls_go_through_the_driver_boundary() {
    let driver = FakeDriver::default().with_page("https://shop.test/", FakePage::default());

    let boundary: &dyn PageDriver = &driver;
    boundary.goto("https://shop.test/").await.unwrap();
    boundary.maximize().await.unwrap();
}

#[tokio::test]
async fn overlay_dismissal_tolerates_absence() {
    let driver = FakeDriver::default().with_clickable("//button[@id='accept']");

    let clicked = interaction::dismiss_overlay(
        &driver,
        "No cookies here !",
        "//button[@id='accept']",
        Duration::from_millis(50),
    )
    .await;
    assert!(clicked);

    let absent = interaction::dismiss_overlay(
        &driver,
        "No pop up found !",
        "//div[@class='popup-close']",
        Duration::from_millis(50),
    )
    .await;
    assert!(!absent);
}

#[tokio::test]
async fn search_submission_reports_absence() {
    let driver = FakeDriver::default().with_clickable("//input[@id='search']");

    assert!(
        interaction::search_and_submit(
            &driver,
            "No search bar found !!!",
            "//input[@id='search']",
            "All products",
            Duration::from_millis(50),
        )
        .await
    );
    assert!(
        !interaction::search_and_submit(
            &driver,
            "No search bar found !!!",
            "//input[@id='missing']",
            "All products",
            Duration::from_millis(50),
        )
        .await
    );
}

#[tokio::test]
async fn missing_container_yields_no_links() -> Result<()> {
    let driver = FakeDriver::default().with_container("//div[@class='cols']", &[
        "https://shop.test/a",
        "https://shop.test/b",
    ]);

    let links = interaction::collect_product_links(&driver, "//div[@class='cols']").await?;
    assert_eq!(links.len(), 2);

    let none = interaction::collect_product_links(&driver, "//div[@class='gone']").await?;
    assert!(none.is_empty());
    Ok(())
}
