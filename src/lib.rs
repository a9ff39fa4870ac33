pub mod analytics;
pub mod config;
pub mod feed;
pub mod reconcile;
pub mod report;
pub mod store;
