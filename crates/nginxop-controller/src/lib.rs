//!
//! # NginxOp controller
//!
//! Reconciles `NginxOp` resources into a Deployment, a Service and an Ingress
//! and reports the public url of the Ingress back on the NginxOp status.
//!
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod manifest;
pub mod operator;
pub mod rbac;
pub mod reconcile;
pub mod scheme;
pub mod status;

pub use error::ReconcileError;
pub use reconcile::{NginxOpReconciler, ReconcileOutcome};
