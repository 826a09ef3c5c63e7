//!
//! # Scheme
//!
//! Explicit registry of the resource types the controller reads and writes.
//! The registry is built once and handed to the reconciler; nothing is
//! registered implicitly.
//!
use std::any::{TypeId, type_name};
use std::collections::HashMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use kube::core::TypeMeta;

use nginxop_metadata::NginxOp;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    #[error("type {type_name} is not registered in scheme")]
    NotRegistered { type_name: &'static str },
    #[error("owner is missing {0}")]
    MissingOwnerField(&'static str),
}

#[derive(Debug, Default, Clone)]
pub struct Scheme {
    types: HashMap<TypeId, TypeMeta>,
}

impl Scheme {
    /// scheme with every type the NginxOp controller touches
    pub fn nginxop() -> Self {
        Self::default()
            .register::<NginxOp>()
            .register::<Deployment>()
            .register::<Service>()
            .register::<Ingress>()
    }

    pub fn register<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()> + 'static,
    {
        self.types.insert(
            TypeId::of::<K>(),
            TypeMeta {
                api_version: K::api_version(&()).into_owned(),
                kind: K::kind(&()).into_owned(),
            },
        );
        self
    }

    pub fn is_registered<K: 'static>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<K>())
    }

    pub fn type_meta<K: 'static>(&self) -> Result<&TypeMeta, SchemeError> {
        self.types
            .get(&TypeId::of::<K>())
            .ok_or(SchemeError::NotRegistered {
                type_name: type_name::<K>(),
            })
    }

    /// reference marking `owner` as the managing controller of a child object
    pub fn controller_reference<K>(&self, owner: &K) -> Result<OwnerReference, SchemeError>
    where
        K: Resource<DynamicType = ()> + 'static,
    {
        let type_meta = self.type_meta::<K>()?;
        let meta = owner.meta();
        let name = meta
            .name
            .clone()
            .ok_or(SchemeError::MissingOwnerField("metadata.name"))?;
        let uid = meta
            .uid
            .clone()
            .ok_or(SchemeError::MissingOwnerField("metadata.uid"))?;

        Ok(OwnerReference {
            api_version: type_meta.api_version.clone(),
            kind: type_meta.kind.clone(),
            name,
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        })
    }
}

#[cfg(test)]
mod test {

    use nginxop_metadata::{NginxOpSpec, ObjectKey};

    use super::*;

    fn owner() -> NginxOp {
        let mut nginxop = NginxOp::new(&ObjectKey::new("default", "web"), NginxOpSpec::default());
        nginxop.metadata.uid = Some("0d5c3d5e-uid".to_owned());
        nginxop
    }

    #[test]
    fn test_controller_reference() {
        let scheme = Scheme::nginxop();
        let owner_ref = scheme.controller_reference(&owner()).expect("owner ref");
        assert_eq!(owner_ref.api_version, "nginxop.my.domain/v1");
        assert_eq!(owner_ref.kind, "NginxOp");
        assert_eq!(owner_ref.name, "web");
        assert_eq!(owner_ref.uid, "0d5c3d5e-uid");
        assert_eq!(owner_ref.controller, Some(true));
        assert_eq!(owner_ref.block_owner_deletion, Some(true));
    }

    #[test]
    fn test_unregistered_owner() {
        let scheme = Scheme::default().register::<Deployment>();
        assert!(!scheme.is_registered::<NginxOp>());
        let err = scheme
            .controller_reference(&owner())
            .expect_err("not registered");
        assert!(matches!(err, SchemeError::NotRegistered { .. }));
    }

    #[test]
    fn test_owner_without_uid() {
        let scheme = Scheme::nginxop();
        let mut nginxop = owner();
        nginxop.metadata.uid = None;
        assert_eq!(
            scheme.controller_reference(&nginxop),
            Err(SchemeError::MissingOwnerField("metadata.uid"))
        );
    }

    #[test]
    fn test_builtin_type_meta() {
        let scheme = Scheme::nginxop();
        let meta = scheme.type_meta::<Ingress>().expect("registered");
        assert_eq!(meta.api_version, "networking.k8s.io/v1");
        assert_eq!(meta.kind, "Ingress");
        assert_eq!(
            scheme.type_meta::<Deployment>().expect("registered").api_version,
            "apps/v1"
        );
    }
}
