//! Supplement Scraper - browser-driven product scraper for a UK supplement
//! store.
//!
//! Drives one WebDriver session against the target site, extracts product
//! metadata and images by XPath, deduplicates images against a local
//! canonical folder, and persists to JSON, a pivot-table HTML view, an
//! object-storage bucket and a relational database. Strictly sequential:
//! one session, one record at a time, bounded sleep-based waits.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;
