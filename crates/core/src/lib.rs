//! FediSync core library.
//!
//! This crate reconciles subscriptions, blocks, and profile settings across
//! Lemmy accounts on independent instances: configuration, the instance
//! client capability and its HTTP implementation, snapshots, target-state
//! policies, plan building and execution, and the sync engine.

pub mod client;
pub mod config;
pub mod errors;
pub mod executor;
pub mod lemmy;
pub mod models;
pub mod observer;
pub mod plan;
pub mod policy;
pub mod report;
pub mod site_url;
pub mod snapshot;
pub mod sync_engine;

// Re-exports for convenience.
pub use client::InstanceClient;
pub use config::AppConfig;
pub use lemmy::LemmyClient;
pub use policy::Policy;
pub use report::SyncReport;
pub use sync_engine::{AccountClient, SyncEngine, SyncOptions};
