//! Price-alert monitoring engine: user-defined threshold rules evaluated on
//! a fixed interval against a price feed, with durable storage, idempotent
//! triggering, and notification dispatch.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod feed;
pub mod model;
pub mod notifier;
pub mod scheduler;
pub mod store;
