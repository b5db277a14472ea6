//! Shared plumbing for Terraform providers
//!
//! Schema definitions, the line-delimited JSON-RPC plugin protocol, the
//! resource contract with its [`ResourceData`] view, the dispatcher that
//! ties them together, and an acceptance-test harness.

pub mod acctest;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod server;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::{ProviderError, ProviderResult};
pub use logging::LoggingConfig;
pub use protocol::{Diagnostic, DiagnosticSeverity};
pub use provider::{AppliedChange, PlannedChange, Provider, ProviderDefinition};
pub use resource::Resource;
pub use schema::{
    AttributeType, NestedBlock, NestingMode, ResourceSchema, SchemaAttribute, SchemaBlock,
};
pub use server::serve;
pub use state::{ResourceData, ResourceState};
