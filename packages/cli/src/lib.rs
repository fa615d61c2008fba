//! consulctl Library
//!
//! Keeps a service definition file in sync with a Consul agent: the
//! definition model and its file store, the agent HTTP client, settings
//! resolution, and the command implementations used by the binary.

pub mod agent;
pub mod commands;
pub mod config;
pub mod definition;
pub mod error;

// Re-exports for convenience
pub use agent::AgentClient;
pub use config::{AgentArgs, Config, Protocol, Settings};
pub use definition::{HealthCheck, ServiceDefinition, TagOutcome, Weights};
pub use error::{StoreError, SyncError};
