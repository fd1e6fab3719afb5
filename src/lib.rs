//! Zeus: a file-backed, schema-validated, concurrently-accessed
//! project-planning knowledge base, with a CLI front end and a read-only
//! dashboard feed.

pub mod approval_queue;
pub mod bus;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod id;
pub mod integrity;
pub mod model;
pub mod rollup;
pub mod snapshot;
pub mod store;
