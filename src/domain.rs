//! Domain module - core data model for scraped products.

pub mod record;
