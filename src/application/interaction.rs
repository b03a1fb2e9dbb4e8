//! Interaction layer: overlay dismissal, search submission, and product
//! link enumeration.
//!
//! Every "find one element" here is a tolerated-absence operation: a bounded
//! poll (not an unbounded wait), a caller-supplied console message when the
//! element never shows up, and no escalation. Transport failures are logged
//! too; the interaction layer never aborts the run.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::infrastructure::browser::{BrowserError, PageDriver};

/// Poll interval inside a bounded element wait.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Wait up to `wait` for an element to exist and click it.
///
/// Used for cookie banners and popups; absence is a normal outcome. Returns
/// whether the click happened.
pub async fn dismiss_overlay(
    driver: &dyn PageDriver,
    absent_msg: &str,
    xpath: &str,
    wait: Duration,
) -> bool {
    let deadline = Instant::now() + wait;
    loop {
        match driver.click(xpath).await {
            Ok(()) => {
                debug!("Dismissed overlay at {xpath}");
                return true;
            }
            Err(BrowserError::NoSuchElement(_)) => {
                if Instant::now() >= deadline {
                    info!("{absent_msg}");
                    return false;
                }
                sleep(POLL_INTERVAL).await;
            }
            Err(BrowserError::Transport(e)) => {
                warn!("Overlay click failed at {xpath}: {e}");
                return false;
            }
        }
    }
}

/// Wait up to `wait` for the search input, click it, type `text` and submit.
///
/// Returns whether the search was submitted; absence logs the caller's
/// message and returns `false`.
pub async fn search_and_submit(
    driver: &dyn PageDriver,
    absent_msg: &str,
    xpath: &str,
    text: &str,
    wait: Duration,
) -> bool {
    let deadline = Instant::now() + wait;
    loop {
        match driver.type_and_submit(xpath, text).await {
            Ok(()) => {
                debug!("Submitted search '{text}'");
                return true;
            }
            Err(BrowserError::NoSuchElement(_)) => {
                if Instant::now() >= deadline {
                    info!("{absent_msg}");
                    return false;
                }
                sleep(POLL_INTERVAL).await;
            }
            Err(BrowserError::Transport(e)) => {
                warn!("Search submission failed at {xpath}: {e}");
                return false;
            }
        }
    }
}

/// Enumerate the subcategory container's child links, in document order.
///
/// A missing container yields an empty list (tolerated absence); only a
/// broken session is escalated.
pub async fn collect_product_links(
    driver: &dyn PageDriver,
    container_xpath: &str,
) -> anyhow::Result<Vec<String>> {
    match driver.child_link_hrefs(container_xpath).await {
        Ok(links) => {
            info!("Discovered {} product link(s)", links.len());
            Ok(links)
        }
        Err(BrowserError::NoSuchElement(_)) => {
            warn!("No subcategory container found at {container_xpath}");
            Ok(Vec::new())
        }
        Err(BrowserError::Transport(e)) => Err(anyhow::anyhow!(
            "Link enumeration failed at {container_xpath}: {e}"
        )),
    }
}
