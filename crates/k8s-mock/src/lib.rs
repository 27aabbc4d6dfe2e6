//! Mock Kubernetes API server for testing.
//!
//! Provides an HTTP server that can be used with kubeconfig-based connections.
//! It serves reads and full replacements of a fixed set of kinds, and can be
//! told to reject some requests with `403 Forbidden`.

pub mod http;
pub mod kinds;

pub use http::{HttpMockK8sServer, RunningHttpMockK8sServer};
pub use kinds::MockKind;
