//! HTTP implementation of [`crate::client::InstanceClient`] for Lemmy.

pub mod client;
pub mod wire;

pub use client::LemmyClient;
