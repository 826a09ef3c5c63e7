//!
//! # Manifests
//!
//! Target shapes of the objects owned by an NginxOp. Every function here is
//! pure: the same NginxOp always yields the same objects. Children share the
//! owner's name and namespace and carry a controller reference back to it.
//!
use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use nginxop_metadata::NginxOp;
use nginxop_metadata::defaults::{
    APP_LABEL, APP_LABEL_VALUE, CONTAINER_NAME, DEFAULT_PATH, HTTP_PORT, HTTP_PORT_NAME,
    ISSUER_LABEL, ISSUER_NAME, LOAD_BALANCER, PATH_TYPE_PREFIX, SELECTOR_LABEL, TCP,
    TLS_SECRET_NAME,
};

use crate::scheme::{Scheme, SchemeError};

/// All objects derived from a single NginxOp
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredChildren {
    pub deployment: Deployment,
    pub service: Service,
    pub ingress: Ingress,
}

impl DesiredChildren {
    pub fn derive(nginxop: &NginxOp, scheme: &Scheme) -> Result<Self, SchemeError> {
        Ok(Self {
            deployment: desired_deployment(nginxop, scheme)?,
            service: desired_service(nginxop, scheme)?,
            ingress: desired_ingress(nginxop, scheme)?,
        })
    }
}

/// labels selecting the pods of an NginxOp
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(SELECTOR_LABEL.to_owned(), name.to_owned())])
}

pub fn pod_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(name);
    labels.insert(APP_LABEL.to_owned(), APP_LABEL_VALUE.to_owned());
    labels
}

/// metadata shared by all children: owner's identity plus controller reference
fn child_meta(nginxop: &NginxOp, scheme: &Scheme) -> Result<ObjectMeta, SchemeError> {
    let owner_ref = scheme.controller_reference(nginxop)?;
    Ok(ObjectMeta {
        name: nginxop.metadata.name.clone(),
        namespace: nginxop.metadata.namespace.clone(),
        owner_references: Some(vec![owner_ref]),
        ..Default::default()
    })
}

fn owner_name(nginxop: &NginxOp) -> Result<&str, SchemeError> {
    nginxop
        .metadata
        .name
        .as_deref()
        .ok_or(SchemeError::MissingOwnerField("metadata.name"))
}

pub fn desired_deployment(nginxop: &NginxOp, scheme: &Scheme) -> Result<Deployment, SchemeError> {
    let metadata = child_meta(nginxop, scheme)?;
    let name = owner_name(nginxop)?;

    let template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(pod_labels(name)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CONTAINER_NAME.to_owned(),
                image: Some(nginxop.spec.image.clone()),
                ports: Some(vec![ContainerPort {
                    container_port: HTTP_PORT,
                    name: Some(HTTP_PORT_NAME.to_owned()),
                    protocol: Some(TCP.to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        }),
    };

    Ok(Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(nginxop.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(name)),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        status: None,
    })
}

pub fn desired_service(nginxop: &NginxOp, scheme: &Scheme) -> Result<Service, SchemeError> {
    let metadata = child_meta(nginxop, scheme)?;
    let name = owner_name(nginxop)?;

    Ok(Service {
        metadata,
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(HTTP_PORT_NAME.to_owned()),
                port: HTTP_PORT,
                protocol: Some(TCP.to_owned()),
                target_port: Some(IntOrString::String(HTTP_PORT_NAME.to_owned())),
                ..Default::default()
            }]),
            selector: Some(selector_labels(name)),
            type_: Some(LOAD_BALANCER.to_owned()),
            ..Default::default()
        }),
        status: None,
    })
}

pub fn desired_ingress(nginxop: &NginxOp, scheme: &Scheme) -> Result<Ingress, SchemeError> {
    let mut metadata = child_meta(nginxop, scheme)?;
    metadata.labels = Some(BTreeMap::from([(
        ISSUER_LABEL.to_owned(),
        ISSUER_NAME.to_owned(),
    )]));
    let name = owner_name(nginxop)?;
    let host = &nginxop.spec.host;

    let path = HTTPIngressPath {
        path: Some(DEFAULT_PATH.to_owned()),
        path_type: PATH_TYPE_PREFIX.to_owned(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: name.to_owned(),
                port: Some(ServiceBackendPort {
                    number: Some(HTTP_PORT),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        },
    };

    Ok(Ingress {
        metadata,
        spec: Some(IngressSpec {
            tls: Some(vec![IngressTLS {
                hosts: Some(vec![host.clone()]),
                secret_name: Some(TLS_SECRET_NAME.to_owned()),
            }]),
            rules: Some(vec![IngressRule {
                host: Some(host.clone()),
                http: Some(HTTPIngressRuleValue { paths: vec![path] }),
            }]),
            ..Default::default()
        }),
        status: None,
    })
}

#[cfg(test)]
mod test {

    use nginxop_metadata::{NginxOpSpec, ObjectKey};

    use super::*;

    fn scenario() -> NginxOp {
        let mut nginxop = NginxOp::new(
            &ObjectKey::new("default", "web"),
            NginxOpSpec {
                replicas: 2,
                host: "app.example.com".to_owned(),
                image: "registry/app:v1".to_owned(),
            },
        );
        nginxop.metadata.uid = Some("uid-1".to_owned());
        nginxop
    }

    fn derive() -> DesiredChildren {
        DesiredChildren::derive(&scenario(), &Scheme::nginxop()).expect("derive")
    }

    #[test]
    fn test_deployment_shape() {
        let deployment = derive().deployment;
        assert_eq!(deployment.metadata.name.as_deref(), Some("web"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("default"));

        let spec = deployment.spec.expect("spec");
        assert_eq!(spec.replicas, Some(2));

        let pod = spec.template.spec.expect("pod spec");
        assert_eq!(pod.containers.len(), 1);
        let container = &pod.containers[0];
        assert_eq!(container.name, "nginx");
        assert_eq!(container.image.as_deref(), Some("registry/app:v1"));
        let ports = container.ports.as_ref().expect("ports");
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].container_port, 80);
        assert_eq!(ports[0].name.as_deref(), Some("http"));
    }

    #[test]
    fn test_service_shape() {
        let service = derive().service;
        let spec = service.spec.expect("spec");
        assert_eq!(spec.type_.as_deref(), Some("LoadBalancer"));
        let ports = spec.ports.expect("ports");
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 80);
        assert_eq!(
            ports[0].target_port,
            Some(IntOrString::String("http".to_owned()))
        );
    }

    #[test]
    fn test_ingress_shape() {
        let ingress = derive().ingress;
        assert_eq!(
            ingress.metadata.labels.as_ref().and_then(|l| l.get(ISSUER_LABEL)),
            Some(&"test-selfsigned".to_owned())
        );

        let spec = ingress.spec.expect("spec");
        let tls = spec.tls.expect("tls");
        assert_eq!(tls.len(), 1);
        assert_eq!(tls[0].hosts, Some(vec!["app.example.com".to_owned()]));
        assert_eq!(tls[0].secret_name.as_deref(), Some("selfsigned-cert-tls"));

        let rules = spec.rules.expect("rules");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].host.as_deref(), Some("app.example.com"));
        let paths = &rules[0].http.as_ref().expect("http").paths;
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path.as_deref(), Some("/"));
        assert_eq!(paths[0].path_type, "Prefix");
        let backend = paths[0].backend.service.as_ref().expect("service backend");
        assert_eq!(backend.name, "web");
        assert_eq!(backend.port.as_ref().and_then(|p| p.number), Some(80));
    }

    #[test]
    fn test_children_owned_by_parent() {
        let children = derive();
        for meta in [
            &children.deployment.metadata,
            &children.service.metadata,
            &children.ingress.metadata,
        ] {
            let owners = meta.owner_references.as_ref().expect("owners");
            assert_eq!(owners.len(), 1);
            assert_eq!(owners[0].kind, "NginxOp");
            assert_eq!(owners[0].name, "web");
            assert_eq!(owners[0].uid, "uid-1");
            assert_eq!(owners[0].controller, Some(true));
        }
    }

    #[test]
    fn test_selector_matches_pod_labels() {
        let children = derive();
        let pod_labels = children
            .deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.metadata.as_ref())
            .and_then(|meta| meta.labels.clone())
            .expect("pod labels");
        let selector = children
            .service
            .spec
            .as_ref()
            .and_then(|spec| spec.selector.clone())
            .expect("selector");

        assert!(!selector.is_empty());
        for (key, value) in &selector {
            assert_eq!(pod_labels.get(key), Some(value));
        }

        let match_labels = children
            .deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.selector.match_labels.clone())
            .expect("match labels");
        assert_eq!(match_labels, selector);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let nginxop = scenario();
        let scheme = Scheme::nginxop();
        let first = DesiredChildren::derive(&nginxop, &scheme).expect("derive");
        let second = DesiredChildren::derive(&nginxop, &scheme).expect("derive");

        assert_eq!(
            serde_json::to_vec(&first.deployment).expect("json"),
            serde_json::to_vec(&second.deployment).expect("json")
        );
        assert_eq!(
            serde_json::to_vec(&first.service).expect("json"),
            serde_json::to_vec(&second.service).expect("json")
        );
        assert_eq!(
            serde_json::to_vec(&first.ingress).expect("json"),
            serde_json::to_vec(&second.ingress).expect("json")
        );
    }

    #[test]
    fn test_replicas_taken_verbatim() {
        let mut nginxop = scenario();
        nginxop.spec.replicas = 0;
        let deployment = desired_deployment(&nginxop, &Scheme::nginxop()).expect("derive");
        assert_eq!(deployment.spec.and_then(|spec| spec.replicas), Some(0));
    }

    #[test]
    fn test_derive_fails_without_registration() {
        let scheme = Scheme::default()
            .register::<Deployment>()
            .register::<Service>()
            .register::<Ingress>();
        let err = DesiredChildren::derive(&scenario(), &scheme).expect_err("unregistered owner");
        assert!(matches!(err, SchemeError::NotRegistered { .. }));
    }

    #[test]
    fn test_manifest_type_meta() {
        let value = serde_json::to_value(derive().ingress).expect("json");
        assert_eq!(value["apiVersion"], "networking.k8s.io/v1");
        assert_eq!(value["kind"], "Ingress");
        assert_eq!(value["spec"]["tls"][0]["secretName"], "selfsigned-cert-tls");
    }
}
