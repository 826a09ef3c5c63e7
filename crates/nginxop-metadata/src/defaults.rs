//! Fixed names, ports and labels shared by every derived object.

/// API group of the NginxOp resource
pub const GROUP: &str = "nginxop.my.domain";
pub const VERSION: &str = "v1";
pub const API_VERSION: &str = "nginxop.my.domain/v1";
pub const KIND: &str = "NginxOp";
pub const PLURAL: &str = "nginxops";
pub const SINGULAR: &str = "nginxop";

/// replica count used when the spec leaves it unset
pub const DEFAULT_REPLICAS: i32 = 1;

pub const CONTAINER_NAME: &str = "nginx";
pub const HTTP_PORT_NAME: &str = "http";
pub const HTTP_PORT: i32 = 80;
pub const TCP: &str = "TCP";

/// label keyed by the owner's name, shared by pod template and service selector
pub const SELECTOR_LABEL: &str = "nginx";
pub const APP_LABEL: &str = "app";
pub const APP_LABEL_VALUE: &str = "nginx";

pub const LOAD_BALANCER: &str = "LoadBalancer";

pub const DEFAULT_PATH: &str = "/";
pub const PATH_TYPE_PREFIX: &str = "Prefix";

/// cert-manager issuer responsible for populating the TLS secret
pub const ISSUER_LABEL: &str = "cert-manager.io/issuer";
pub const ISSUER_NAME: &str = "test-selfsigned";
pub const TLS_SECRET_NAME: &str = "selfsigned-cert-tls";

pub const URL_SCHEME: &str = "http";
