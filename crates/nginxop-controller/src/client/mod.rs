//!
//! # Object store access
//!
//! Capabilities the reconciler needs from the object store: read by identity,
//! forced server-side apply and status update. `K8ReconcileClient` talks to a
//! cluster; `LocalReconcileClient` keeps objects in memory.
//!
mod k8;
mod local;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;

use nginxop_metadata::ObjectKey;

pub use k8::K8ReconcileClient;
pub use local::{Fault, LocalReconcileClient, Operation};

pub type SharedClient<C> = Arc<C>;

/// Namespaced object the controller can read and write
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: ObjectKey },
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: ObjectKey },
    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: String,
        key: ObjectKey,
        message: String,
    },
    #[error("invalid {kind}: {message}")]
    Invalid { kind: String, message: String },
    #[error("injected failure on {operation} {kind} {key}")]
    Injected {
        operation: Operation,
        kind: String,
        key: ObjectKey,
    },
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

const REASON_ALREADY_EXISTS: &str = "AlreadyExists";
const REASON_NOT_FOUND: &str = "NotFound";

impl ClientError {
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => true,
            Self::Kube(kube::Error::Api(response)) => response.reason == REASON_ALREADY_EXISTS,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube(kube::Error::Api(response)) => {
                response.reason == REASON_NOT_FOUND || response.code == 404
            }
            _ => false,
        }
    }
}

#[async_trait]
pub trait ReconcileClient: Send + Sync {
    /// object with the given identity, `None` if it doesn't exist
    async fn retrieve_item<K>(&self, key: &ObjectKey) -> Result<Option<K>, ClientError>
    where
        K: ManagedResource;

    /// set the object to exactly this shape, creating it if absent.
    /// Fields held by other managers are taken over by `field_owner`.
    async fn apply<K>(&self, value: K, field_owner: &str) -> Result<K, ClientError>
    where
        K: ManagedResource;

    /// write the status of an existing object.
    /// Fails with a conflict if the object changed since it was read.
    async fn update_status<K>(&self, value: &K) -> Result<K, ClientError>
    where
        K: ManagedResource;
}

/// identity of an object about to be written
pub(crate) fn key_of<K: ManagedResource>(value: &K) -> Result<ObjectKey, ClientError> {
    ObjectKey::from_meta(value.meta()).ok_or_else(|| ClientError::Invalid {
        kind: K::kind(&()).into_owned(),
        message: "metadata.name and metadata.namespace are required".to_owned(),
    })
}

#[cfg(test)]
mod test {

    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(reason: &str, code: u16) -> ClientError {
        ClientError::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_owned(),
            message: format!("{reason} from api server"),
            reason: reason.to_owned(),
            code,
        }))
    }

    #[test]
    fn test_already_exists_classification() {
        let key = ObjectKey::new("default", "web");
        assert!(
            ClientError::AlreadyExists {
                kind: "Ingress".to_owned(),
                key: key.clone()
            }
            .is_already_exists()
        );
        assert!(api_error("AlreadyExists", 409).is_already_exists());
        assert!(!api_error("Conflict", 409).is_already_exists());
        assert!(
            !ClientError::Conflict {
                kind: "Ingress".to_owned(),
                key,
                message: "stale".to_owned()
            }
            .is_already_exists()
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(api_error("NotFound", 404).is_not_found());
        assert!(!api_error("AlreadyExists", 409).is_not_found());
    }
}
