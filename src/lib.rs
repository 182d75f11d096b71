pub mod api;
pub mod catalog;
pub mod database_ops;
pub mod normalization;
pub mod orchestrator;
pub mod tracing;

pub mod util {
    pub mod db;
    pub mod env;
}

pub use catalog::models::{CatalogEntry, ScrapedProduct};
pub use orchestrator::{SyncConfig, SyncReport, SyncService};
