//!
//! # NginxOp metadata
//!
//! Resource types shared by the operator and its clients: the `NginxOp`
//! desired-state resource, its identity and the fixed naming policy applied to
//! the objects derived from it.
//!

pub mod crd;
pub mod defaults;
mod key;
mod nginxop;

pub use key::ObjectKey;
pub use nginxop::{NginxOp, NginxOpSpec, NginxOpStatus};

pub use k8s_openapi;
