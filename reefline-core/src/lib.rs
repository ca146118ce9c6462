//! Reefline Core - Tenant Resolution Backend
//!
//! This crate resolves which dive shop a request belongs to, assembles the
//! authorization context for it (membership, plan, usage, limits) and runs
//! tenant data access inside row-level security scopes.

pub mod api;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod repository;
pub mod scope;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
