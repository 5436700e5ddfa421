//! Domain types - site descriptors, persisted site status and configuration.
//!
//! These types are independent of how status is stored or how indexing runs
//! are scheduled.

pub mod config;
pub mod site;
