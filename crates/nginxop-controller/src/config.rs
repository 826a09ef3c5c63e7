//!
//! # Operator configuration
//!
//! Parameters of the watch loop. Connection settings for the api server are
//! not part of it; they come from kubeconfig or the in-cluster environment.
//!
use std::time::Duration;

pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CONCURRENCY: u16 = 4;
pub const DEFAULT_CLUSTER_ROLE: &str = "nginxop-manager-role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// watch a single namespace, all namespaces when unset
    pub namespace: Option<String>,
    /// requeue delay after a successful pass
    pub resync_interval: Duration,
    /// requeue delay after a failed pass
    pub retry_interval: Duration,
    /// passes running at the same time, 0 means unbounded
    pub concurrency: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}
