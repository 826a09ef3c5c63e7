//!
//! # In-memory object store
//!
//! Keeps objects as json documents keyed by kind and identity. Writes follow
//! api server semantics closely enough to exercise the reconciler without a
//! cluster: uid and resource version are server assigned, apply never touches
//! status, status updates never touch spec, and a write that changes nothing
//! keeps the resource version. Faults can be queued per operation and kind.
//!
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_lock::RwLock;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use nginxop_metadata::ObjectKey;

use super::{ClientError, ManagedResource, ReconcileClient, key_of};

/// metadata fields owned by the store rather than the writer
const SERVER_FIELDS: [&str; 3] = ["uid", "resourceVersion", "creationTimestamp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Retrieve,
    Apply,
    UpdateStatus,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Retrieve => write!(f, "retrieve"),
            Self::Apply => write!(f, "apply"),
            Self::UpdateStatus => write!(f, "update_status"),
        }
    }
}

/// Failure returned by the next matching operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    AlreadyExists,
    Conflict,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub operation: Operation,
    pub kind: String,
    pub key: ObjectKey,
}

#[derive(Debug, Clone)]
struct StoredObject {
    value: Value,
    field_owner: Option<String>,
}

type StoreKey = (String, ObjectKey);

#[derive(Debug, Default)]
pub struct LocalReconcileClient {
    version: AtomicU64,
    objects: RwLock<BTreeMap<StoreKey, StoredObject>>,
    faults: RwLock<HashMap<(Operation, String), VecDeque<Fault>>>,
    history: RwLock<Vec<Record>>,
}

fn kind_of<K: ManagedResource>() -> String {
    K::kind(&()).into_owned()
}

impl LocalReconcileClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// current store version, advanced by every write that changed something
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// create an object as an outside actor would
    pub async fn create<K>(&self, value: K) -> Result<K, ClientError>
    where
        K: ManagedResource,
    {
        let kind = kind_of::<K>();
        let key = key_of(&value)?;
        let mut write = self.objects.write().await;
        if write.contains_key(&(kind.clone(), key.clone())) {
            return Err(ClientError::AlreadyExists { kind, key });
        }

        let mut document = serde_json::to_value(&value)?;
        self.assign_identity(&mut document);
        debug!(%kind, %key, "created");
        let created = serde_json::from_value(document.clone())?;
        write.insert(
            (kind, key),
            StoredObject {
                value: document,
                field_owner: None,
            },
        );
        Ok(created)
    }

    /// edit an existing object as an outside actor would, status included
    pub async fn modify<K, F>(&self, key: &ObjectKey, edit: F) -> Result<K, ClientError>
    where
        K: ManagedResource,
        F: FnOnce(&mut K) + Send,
    {
        let kind = kind_of::<K>();
        let mut write = self.objects.write().await;
        let stored = write
            .get_mut(&(kind.clone(), key.clone()))
            .ok_or_else(|| ClientError::NotFound {
                kind: kind.clone(),
                key: key.clone(),
            })?;

        let mut item: K = serde_json::from_value(stored.value.clone())?;
        edit(&mut item);
        let mut document = serde_json::to_value(&item)?;
        copy_server_fields(&stored.value, &mut document);
        self.store_if_changed(stored, document)
    }

    /// delete an object together with everything it transitively owns
    pub async fn delete<K>(&self, key: &ObjectKey) -> bool
    where
        K: ManagedResource,
    {
        let mut write = self.objects.write().await;
        let Some(removed) = write.remove(&(kind_of::<K>(), key.clone())) else {
            return false;
        };

        let mut orphaned_owners: Vec<String> = uid_of(&removed.value).into_iter().collect();
        while let Some(owner_uid) = orphaned_owners.pop() {
            let owned: Vec<StoreKey> = write
                .iter()
                .filter(|(_, stored)| is_owned_by(&stored.value, &owner_uid))
                .map(|(store_key, _)| store_key.clone())
                .collect();
            for store_key in owned {
                if let Some(child) = write.remove(&store_key) {
                    debug!(kind = %store_key.0, key = %store_key.1, "garbage collected");
                    orphaned_owners.extend(uid_of(&child.value));
                }
            }
        }
        self.version.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// fail the next `operation` on `kind` with `fault`
    pub async fn inject_fault(&self, operation: Operation, kind: &str, fault: Fault) {
        self.faults
            .write()
            .await
            .entry((operation, kind.to_owned()))
            .or_default()
            .push_back(fault);
    }

    /// field manager of the last apply to an object
    pub async fn field_owner<K>(&self, key: &ObjectKey) -> Option<String>
    where
        K: ManagedResource,
    {
        self.objects
            .read()
            .await
            .get(&(kind_of::<K>(), key.clone()))
            .and_then(|stored| stored.field_owner.clone())
    }

    pub async fn count<K>(&self) -> usize
    where
        K: ManagedResource,
    {
        let kind = kind_of::<K>();
        self.objects
            .read()
            .await
            .keys()
            .filter(|(stored_kind, _)| *stored_kind == kind)
            .count()
    }

    /// every operation requested through `ReconcileClient`, in order
    pub async fn history(&self) -> Vec<Record> {
        self.history.read().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    async fn begin<K>(&self, operation: Operation, key: &ObjectKey) -> Result<(), ClientError>
    where
        K: ManagedResource,
    {
        let kind = kind_of::<K>();
        self.history.write().await.push(Record {
            operation,
            kind: kind.clone(),
            key: key.clone(),
        });

        let fault = self
            .faults
            .write()
            .await
            .get_mut(&(operation, kind.clone()))
            .and_then(VecDeque::pop_front);

        match fault {
            None => Ok(()),
            Some(fault) => {
                debug!(%operation, %kind, %key, ?fault, "injecting fault");
                let key = key.clone();
                Err(match fault {
                    Fault::AlreadyExists => ClientError::AlreadyExists { kind, key },
                    Fault::Conflict => ClientError::Conflict {
                        kind,
                        key,
                        message: "injected conflict".to_owned(),
                    },
                    Fault::Unavailable => ClientError::Injected {
                        operation,
                        kind,
                        key,
                    },
                })
            }
        }
    }

    fn assign_identity(&self, document: &mut Value) {
        if let Some(metadata) = metadata_mut(document) {
            metadata.insert(
                "uid".to_owned(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
            metadata.insert("resourceVersion".to_owned(), self.next_version());
        }
    }

    fn next_version(&self) -> Value {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Value::String(version.to_string())
    }

    fn store_if_changed<K>(
        &self,
        stored: &mut StoredObject,
        mut document: Value,
    ) -> Result<K, ClientError>
    where
        K: ManagedResource,
    {
        if document != stored.value {
            if let Some(metadata) = metadata_mut(&mut document) {
                metadata.insert("resourceVersion".to_owned(), self.next_version());
            }
            stored.value = document;
        } else {
            trace!("no change, keeping resource version");
        }
        Ok(serde_json::from_value(stored.value.clone())?)
    }
}

#[async_trait]
impl ReconcileClient for LocalReconcileClient {
    async fn retrieve_item<K>(&self, key: &ObjectKey) -> Result<Option<K>, ClientError>
    where
        K: ManagedResource,
    {
        self.begin::<K>(Operation::Retrieve, key).await?;
        self.objects
            .read()
            .await
            .get(&(kind_of::<K>(), key.clone()))
            .map(|stored| serde_json::from_value(stored.value.clone()))
            .transpose()
            .map_err(Into::into)
    }

    async fn apply<K>(&self, value: K, field_owner: &str) -> Result<K, ClientError>
    where
        K: ManagedResource,
    {
        let kind = kind_of::<K>();
        let key = key_of(&value)?;
        self.begin::<K>(Operation::Apply, &key).await?;

        let mut document = serde_json::to_value(&value)?;
        if let Some(object) = document.as_object_mut() {
            object.remove("status");
        }

        let mut write = self.objects.write().await;
        match write.get_mut(&(kind.clone(), key.clone())) {
            Some(stored) => {
                copy_server_fields(&stored.value, &mut document);
                if let (Some(object), Some(status)) =
                    (document.as_object_mut(), stored.value.get("status"))
                {
                    object.insert("status".to_owned(), status.clone());
                }
                stored.field_owner = Some(field_owner.to_owned());
                trace!(%kind, %key, field_owner, "patching");
                self.store_if_changed(stored, document)
            }
            None => {
                self.assign_identity(&mut document);
                debug!(%kind, %key, field_owner, "created by apply");
                let created = serde_json::from_value(document.clone())?;
                write.insert(
                    (kind, key),
                    StoredObject {
                        value: document,
                        field_owner: Some(field_owner.to_owned()),
                    },
                );
                Ok(created)
            }
        }
    }

    async fn update_status<K>(&self, value: &K) -> Result<K, ClientError>
    where
        K: ManagedResource,
    {
        let kind = kind_of::<K>();
        let key = key_of(value)?;
        self.begin::<K>(Operation::UpdateStatus, &key).await?;

        let mut write = self.objects.write().await;
        let stored = write
            .get_mut(&(kind.clone(), key.clone()))
            .ok_or_else(|| ClientError::NotFound {
                kind: kind.clone(),
                key: key.clone(),
            })?;

        let current_version = stored
            .value
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .map(str::to_owned);
        if let Some(expected) = value.meta().resource_version.as_ref() {
            if current_version.as_ref() != Some(expected) {
                return Err(ClientError::Conflict {
                    kind,
                    key,
                    message: format!(
                        "resource version {expected} is stale, current is {}",
                        current_version.unwrap_or_default()
                    ),
                });
            }
        }

        let status = serde_json::to_value(value)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        let mut document = stored.value.clone();
        if let Some(object) = document.as_object_mut() {
            if status.is_null() {
                object.remove("status");
            } else {
                object.insert("status".to_owned(), status);
            }
        }
        self.store_if_changed(stored, document)
    }
}

fn metadata_mut(document: &mut Value) -> Option<&mut Map<String, Value>> {
    document.get_mut("metadata").and_then(Value::as_object_mut)
}

fn copy_server_fields(from: &Value, to: &mut Value) {
    let (Some(source), Some(metadata)) = (from.get("metadata"), metadata_mut(to)) else {
        return;
    };
    for field in SERVER_FIELDS {
        match source.get(field) {
            Some(value) => {
                metadata.insert(field.to_owned(), value.clone());
            }
            None => {
                metadata.remove(field);
            }
        }
    }
}

fn uid_of(document: &Value) -> Option<String> {
    document
        .pointer("/metadata/uid")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn is_owned_by(document: &Value, owner_uid: &str) -> bool {
    document
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .is_some_and(|owners| {
            owners
                .iter()
                .any(|owner| owner.get("uid").and_then(Value::as_str) == Some(owner_uid))
        })
}
