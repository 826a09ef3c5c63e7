//!
//! # Status projection
//!
//! Public url of an NginxOp, computed from the load balancer endpoint assigned
//! to its Ingress.
//!
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerIngress};

use nginxop_metadata::NginxOpStatus;
use nginxop_metadata::defaults::{HTTP_PORT, URL_SCHEME};

/// url for the first assigned endpoint, empty when nothing is assigned yet.
/// Hostname is preferred over ip.
pub fn url_for_ingress(ingress: &Ingress, port: i32) -> String {
    let host = first_endpoint(ingress).and_then(|endpoint| {
        non_empty(endpoint.hostname.as_deref()).or_else(|| non_empty(endpoint.ip.as_deref()))
    });

    match host {
        Some(host) => format!("{URL_SCHEME}://{}", join_host_port(host, port)),
        None => String::new(),
    }
}

pub fn status_for_ingress(ingress: &Ingress) -> NginxOpStatus {
    NginxOpStatus::new(url_for_ingress(ingress, HTTP_PORT))
}

fn first_endpoint(ingress: &Ingress) -> Option<&IngressLoadBalancerIngress> {
    ingress
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .first()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ipv6 literals need brackets
fn join_host_port(host: &str, port: i32) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
