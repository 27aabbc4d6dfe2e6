//! kubeman: correlated workload view and config map reconciliation for one
//! Kubernetes cluster.

pub mod commands;
pub mod config;
pub mod correlate;
pub mod data;
pub mod k8s;
pub mod output;
pub mod reconcile;
pub mod registry;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
