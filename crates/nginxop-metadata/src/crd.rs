//!
//! # CRD
//!
//! CustomResourceDefinition for `NginxOp`, with the status subresource enabled
//! so that spec and status are written through separate endpoints.
//!
use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
    CustomResourceDefinitionVersion, CustomResourceSubresourceStatus, CustomResourceSubresources,
    CustomResourceValidation, JSON, JSONSchemaProps,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::defaults::{DEFAULT_REPLICAS, GROUP, KIND, PLURAL, SINGULAR, VERSION};

/// name of the definition object, `<plural>.<group>`
pub fn crd_name() -> String {
    format!("{PLURAL}.{GROUP}")
}

pub fn nginxop_crd() -> CustomResourceDefinition {
    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(crd_name()),
            ..Default::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: GROUP.to_owned(),
            names: CustomResourceDefinitionNames {
                kind: KIND.to_owned(),
                list_kind: Some(format!("{KIND}List")),
                plural: PLURAL.to_owned(),
                singular: Some(SINGULAR.to_owned()),
                ..Default::default()
            },
            scope: "Namespaced".to_owned(),
            versions: vec![CustomResourceDefinitionVersion {
                name: VERSION.to_owned(),
                served: true,
                storage: true,
                schema: Some(CustomResourceValidation {
                    open_api_v3_schema: Some(root_schema()),
                }),
                subresources: Some(CustomResourceSubresources {
                    status: Some(CustomResourceSubresourceStatus(serde_json::json!({}))),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        },
        status: None,
    }
}

fn root_schema() -> JSONSchemaProps {
    object_schema(
        "NginxOp is the Schema for the nginxops API",
        [
            ("apiVersion", string_schema("APIVersion of this representation")),
            ("kind", string_schema("Kind of this representation")),
            ("metadata", typed_schema("object", None)),
            ("spec", spec_schema()),
            ("status", status_schema()),
        ],
    )
}

fn spec_schema() -> JSONSchemaProps {
    let replicas = JSONSchemaProps {
        type_: Some("integer".to_owned()),
        format: Some("int32".to_owned()),
        minimum: Some(0.0),
        default: Some(JSON(serde_json::json!(DEFAULT_REPLICAS))),
        description: Some("number of nginx pods".to_owned()),
        ..Default::default()
    };

    object_schema(
        "NginxOpSpec defines the desired state of NginxOp",
        [
            ("replicas", replicas),
            ("host", string_schema("host name used for routing and TLS")),
            ("image", string_schema("container image reference")),
        ],
    )
}

fn status_schema() -> JSONSchemaProps {
    let mut schema = object_schema(
        "NginxOpStatus defines the observed state of NginxOp",
        [("url", string_schema("public url, empty until assigned"))],
    );
    schema.required = Some(vec!["url".to_owned()]);
    schema
}

fn object_schema<const N: usize>(
    description: &str,
    properties: [(&str, JSONSchemaProps); N],
) -> JSONSchemaProps {
    JSONSchemaProps {
        properties: Some(
            properties
                .into_iter()
                .map(|(name, schema)| (name.to_owned(), schema))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..typed_schema("object", Some(description))
    }
}

fn string_schema(description: &str) -> JSONSchemaProps {
    typed_schema("string", Some(description))
}

fn typed_schema(ty: &str, description: Option<&str>) -> JSONSchemaProps {
    JSONSchemaProps {
        type_: Some(ty.to_owned()),
        description: description.map(str::to_owned),
        ..Default::default()
    }
}
