//!
//! # NginxOp
//!
//! Desired-state resource. The spec is authored by users; the status is
//! written only by the reconciler.
//!
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::ObjectKey;
use crate::defaults::{API_VERSION, DEFAULT_REPLICAS, GROUP, KIND, PLURAL, VERSION};

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct NginxOp {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NginxOpSpec,
    #[serde(default)]
    pub status: Option<NginxOpStatus>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NginxOpSpec {
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub image: String,
}

impl Default for NginxOpSpec {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            host: String::new(),
            image: String::new(),
        }
    }
}

fn default_replicas() -> i32 {
    DEFAULT_REPLICAS
}

/// Observed state. `url` stays empty until a load balancer address is assigned.
#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
pub struct NginxOpStatus {
    #[serde(default)]
    pub url: String,
}

impl NginxOpStatus {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl NginxOp {
    pub fn new(key: &ObjectKey, spec: NginxOpSpec) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(key.name.clone()),
                namespace: Some(key.namespace.clone()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    pub fn key(&self) -> Option<ObjectKey> {
        ObjectKey::from_meta(&self.metadata)
    }

    pub fn url(&self) -> &str {
        self.status
            .as_ref()
            .map(|status| status.url.as_str())
            .unwrap_or_default()
    }
}

impl k8s_openapi::Resource for NginxOp {
    const API_VERSION: &'static str = API_VERSION;
    const GROUP: &'static str = GROUP;
    const KIND: &'static str = KIND;
    const VERSION: &'static str = VERSION;
    const URL_PATH_SEGMENT: &'static str = PLURAL;
    type Scope = NamespaceResourceScope;
}

impl k8s_openapi::Metadata for NginxOp {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

// apiVersion and kind are fixed by the type, so they are written out but never read back
impl Serialize for NginxOp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct(KIND, 5)?;
        state.serialize_field("apiVersion", API_VERSION)?;
        state.serialize_field("kind", KIND)?;
        state.serialize_field("metadata", &self.metadata)?;
        state.serialize_field("spec", &self.spec)?;
        match &self.status {
            Some(status) => state.serialize_field("status", status)?,
            None => state.skip_field("status")?,
        }
        state.end()
    }
}
