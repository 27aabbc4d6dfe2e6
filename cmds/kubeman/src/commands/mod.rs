pub mod configmaps;
pub mod util;
pub mod workloads;
