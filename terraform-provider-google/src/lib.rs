//! Terraform provider for Google Cloud
//!
//! Manages Compute Engine disk snapshots over the Compute REST API,
//! speaking the plugin protocol implemented in `provider-common`.

pub mod auth;
pub mod client;
pub mod compute;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod resource_compute_snapshot;
pub mod utils;

pub use client::GoogleClient;
pub use error::{GoogleError, GoogleResult};
pub use provider::GoogleProvider;
pub use resource_compute_snapshot::COMPUTE_SNAPSHOT;
