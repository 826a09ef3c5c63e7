//!
//! # Access declarations
//!
//! Permissions the controller needs. Children are removed by the garbage
//! collector through their owner references, so no rule grants `delete`.
//!
use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use nginxop_metadata::defaults::{GROUP, PLURAL};

const READ_WRITE: [&str; 6] = ["get", "list", "watch", "create", "update", "patch"];
const READ_UPDATE: [&str; 5] = ["get", "list", "watch", "update", "patch"];
const STATUS: [&str; 3] = ["get", "update", "patch"];

fn rule(group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![group.to_owned()]),
        resources: Some(resources.iter().map(|r| (*r).to_owned()).collect()),
        verbs: verbs.iter().map(|v| (*v).to_owned()).collect(),
        ..Default::default()
    }
}

pub fn policy_rules() -> Vec<PolicyRule> {
    let status = format!("{PLURAL}/status");
    vec![
        rule("apps", &["deployments"], &READ_WRITE),
        rule("", &["services"], &READ_WRITE),
        rule("networking.k8s.io", &["ingresses"], &READ_WRITE),
        rule(GROUP, &[PLURAL], &READ_UPDATE),
        rule(GROUP, &[status.as_str()], &STATUS),
    ]
}

pub fn cluster_role(name: &str) -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            ..Default::default()
        },
        rules: Some(policy_rules()),
        ..Default::default()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn verbs_for(resource: &str) -> Vec<String> {
        policy_rules()
            .into_iter()
            .find(|rule| {
                rule.resources
                    .as_ref()
                    .is_some_and(|resources| resources.iter().any(|r| r == resource))
            })
            .map(|rule| rule.verbs)
            .unwrap_or_default()
    }

    #[test]
    fn test_never_deletes() {
        for rule in policy_rules() {
            assert!(!rule.verbs.iter().any(|verb| verb == "delete"));
            assert!(!rule.verbs.iter().any(|verb| verb == "*"));
        }
    }

    #[test]
    fn test_children_are_writable() {
        for resource in ["deployments", "services", "ingresses"] {
            let verbs = verbs_for(resource);
            assert!(verbs.contains(&"create".to_owned()), "{resource}");
            assert!(verbs.contains(&"patch".to_owned()), "{resource}");
            assert!(verbs.contains(&"watch".to_owned()), "{resource}");
        }
    }

    #[test]
    fn test_parent_cannot_be_created() {
        let verbs = verbs_for("nginxops");
        assert!(!verbs.contains(&"create".to_owned()));
        assert!(verbs.contains(&"watch".to_owned()));
        assert_eq!(verbs_for("nginxops/status"), vec!["get", "update", "patch"]);
    }

    #[test]
    fn test_cluster_role_yaml() {
        let role = cluster_role("nginxop-manager-role");
        let yaml = serde_yaml::to_string(&role).expect("yaml");
        assert!(yaml.contains("kind: ClusterRole"));
        assert!(yaml.contains("name: nginxop-manager-role"));
        assert!(yaml.contains("nginxops/status"));
    }
}
