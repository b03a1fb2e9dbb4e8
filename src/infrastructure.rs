//! Infrastructure layer for the browser session, local image storage, and
//! the external sinks (object store, relational database).

pub mod browser;
pub mod config;
pub mod database;
pub mod http_client;
pub mod image_store;
pub mod logging;
pub mod object_store;
pub mod pivot_report;
