//! Kubernetes API access.
//!
//! Everything the engine needs from a cluster goes through the [`fetch::ClusterApi`]
//! trait, so correlation and reconciliation can run against a real cluster or an
//! in-memory one.

pub mod client;
pub mod fetch;

/// Boxed error type carried as the source of cluster call failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
