//! Browser session boundary.
//!
//! The scraping core drives an opaque [`PageDriver`] handle; locator syntax
//! is an uninterpreted string supplied by configuration. The production
//! implementation wraps a `thirtyfour` WebDriver session.

use async_trait::async_trait;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, Key, WebDriver};
use tracing::{debug, info};

/// Browser-boundary failure, split so callers can tell element absence
/// (tolerated) from a broken session (escalated).
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("no element matched locator: {0}")]
    NoSuchElement(String),
    #[error("webdriver failure: {0}")]
    Transport(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Opaque browser-session handle used by the interaction layer and the
/// extraction workflow.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the session to the given URL.
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    /// Maximize the browser window.
    async fn maximize(&self) -> BrowserResult<()>;

    /// Find one element and return its trimmed visible text.
    async fn find_text(&self, xpath: &str) -> BrowserResult<String>;

    /// Find one element and return the given attribute, if set.
    async fn find_attr(&self, xpath: &str, attr: &str) -> BrowserResult<Option<String>>;

    /// Find one element and click it.
    async fn click(&self, xpath: &str) -> BrowserResult<()>;

    /// Find one element, click it, type the text and submit with Enter.
    async fn type_and_submit(&self, xpath: &str, text: &str) -> BrowserResult<()>;

    /// Find a container element and collect the anchor `href` of each of its
    /// direct `div` children, in document order. Children without an anchor
    /// are skipped.
    async fn child_link_hrefs(&self, container_xpath: &str) -> BrowserResult<Vec<String>>;
}

/// WebDriver session configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WebDriverConfig {
    /// WebDriver endpoint, e.g. a local chromedriver.
    pub endpoint: String,
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".to_string(),
            headless: false,
        }
    }
}

/// Production [`PageDriver`] backed by a live WebDriver session.
pub struct WebDriverSession {
    driver: WebDriver,
}

impl WebDriverSession {
    /// Connect to the WebDriver endpoint, open the target URL and maximize
    /// the window.
    pub async fn connect(config: &WebDriverConfig, target_url: &str) -> anyhow::Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if config.headless {
            caps.set_headless()?;
        }

        info!("Connecting to WebDriver at {}", config.endpoint);
        let session = Self {
            driver: WebDriver::new(&config.endpoint, caps).await?,
        };

        session.goto(target_url).await?;
        session.maximize().await?;
        info!("Browser session open at {}", target_url);

        Ok(session)
    }

    /// Close the browser session.
    pub async fn quit(self) -> anyhow::Result<()> {
        self.driver.quit().await?;
        Ok(())
    }
}

fn map_webdriver_error(err: WebDriverError, locator: &str) -> BrowserError {
    match err {
        WebDriverError::NoSuchElement(_) => BrowserError::NoSuchElement(locator.to_string()),
        other => BrowserError::Transport(other.to_string()),
    }
}

#[async_trait]
impl PageDriver for WebDriverSession {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| BrowserError::Transport(e.to_string()))
    }

    async fn maximize(&self) -> BrowserResult<()> {
        self.driver
            .maximize_window()
            .await
            .map_err(|e| BrowserError::Transport(e.to_string()))
    }

    async fn find_text(&self, xpath: &str) -> BrowserResult<String> {
        let element = self
            .driver
            .find(By::XPath(xpath))
            .await
            .map_err(|e| map_webdriver_error(e, xpath))?;
        let text = element
            .text()
            .await
            .map_err(|e| map_webdriver_error(e, xpath))?;
        Ok(text.trim().to_string())
    }

    async fn find_attr(&self, xpath: &str, attr: &str) -> BrowserResult<Option<String>> {
        let element = self
            .driver
            .find(By::XPath(xpath))
            .await
            .map_err(|e| map_webdriver_error(e, xpath))?;
        element
            .attr(attr)
            .await
            .map_err(|e| map_webdriver_error(e, xpath))
    }

    async fn click(&self, xpath: &str) -> BrowserResult<()> {
        let element = self
            .driver
            .find(By::XPath(xpath))
            .await
            .map_err(|e| map_webdriver_error(e, xpath))?;
        element
            .click()
            .await
            .map_err(|e| map_webdriver_error(e, xpath))
    }

    async fn type_and_submit(&self, xpath: &str, text: &str) -> BrowserResult<()> {
        let element = self
            .driver
            .find(By::XPath(xpath))
            .await
            .map_err(|e| map_webdriver_error(e, xpath))?;
        element
            .click()
            .await
            .map_err(|e| map_webdriver_error(e, xpath))?;
        element
            .send_keys(text.to_string() + Key::Enter)
            .await
            .map_err(|e| map_webdriver_error(e, xpath))
    }

    async fn child_link_hrefs(&self, container_xpath: &str) -> BrowserResult<Vec<String>> {
        let container = self
            .driver
            .find(By::XPath(container_xpath))
            .await
            .map_err(|e| map_webdriver_error(e, container_xpath))?;

        let children = container
            .find_all(By::XPath("./div"))
            .await
            .map_err(|e| map_webdriver_error(e, container_xpath))?;

        let mut hrefs = Vec::new();
        for child in children {
            let anchor = match child.find(By::Tag("a")).await {
                Ok(anchor) => anchor,
                Err(WebDriverError::NoSuchElement(_)) => {
                    debug!("Subcategory child without anchor, skipping");
                    continue;
                }
                Err(e) => return Err(map_webdriver_error(e, container_xpath)),
            };
            if let Some(href) = anchor
                .attr("href")
                .await
                .map_err(|e| map_webdriver_error(e, container_xpath))?
            {
                hrefs.push(href);
            }
        }
        Ok(hrefs)
    }
}
