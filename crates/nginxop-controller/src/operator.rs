//!
//! # Watch loop
//!
//! Connects the reconciler to the kube runtime. A pass is triggered by any
//! change of an NginxOp or of a Deployment, Service or Ingress it controls,
//! and by the periodic resync. The runtime never runs two passes for the same
//! NginxOp at once.
//!
use std::sync::Arc;

use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::watcher;
use kube::{Api, Client};
use tracing::{debug, error, info, warn};

use nginxop_metadata::NginxOp;

use crate::client::{K8ReconcileClient, ReconcileClient};
use crate::config::OperatorConfig;
use crate::error::ReconcileError;
use crate::reconcile::NginxOpReconciler;
use crate::scheme::Scheme;

pub struct OperatorContext<C> {
    pub reconciler: NginxOpReconciler<C>,
    pub config: OperatorConfig,
}

impl<C> OperatorContext<C> {
    pub fn new(reconciler: NginxOpReconciler<C>, config: OperatorConfig) -> Self {
        Self { reconciler, config }
    }
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// run controller until a termination signal is received
pub async fn run(client: Client, config: OperatorConfig) {
    let namespace = config.namespace.clone();
    info!(
        namespace = namespace.as_deref().unwrap_or("*"),
        resync = %humantime::format_duration(config.resync_interval),
        retry = %humantime::format_duration(config.retry_interval),
        concurrency = config.concurrency,
        "starting NginxOp controller"
    );

    let reconciler = NginxOpReconciler::new(
        Arc::new(K8ReconcileClient::new(client.clone())),
        Arc::new(Scheme::nginxop()),
    );
    let concurrency = config.concurrency;
    let context = Arc::new(OperatorContext::new(reconciler, config));

    let namespace = namespace.as_deref();
    Controller::new(api::<NginxOp>(&client, namespace), watcher::Config::default())
        .owns(api::<Deployment>(&client, namespace), watcher::Config::default())
        .owns(api::<Service>(&client, namespace), watcher::Config::default())
        .owns(api::<Ingress>(&client, namespace), watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(
            reconcile_nginxop::<K8ReconcileClient>,
            error_policy::<K8ReconcileClient>,
            context,
        )
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(%object, ?action, "pass finished"),
                Err(err) => warn!(%err, "controller error"),
            }
        })
        .await;

    info!("NginxOp controller terminated");
}

pub async fn reconcile_nginxop<C>(
    nginxop: Arc<NginxOp>,
    context: Arc<OperatorContext<C>>,
) -> Result<Action, ReconcileError>
where
    C: ReconcileClient + 'static,
{
    let Some(key) = nginxop.key() else {
        warn!(name = ?nginxop.metadata.name, "NginxOp without namespace or name, ignoring");
        return Ok(Action::await_change());
    };
    context.reconciler.reconcile(&key).await?;
    Ok(Action::requeue(context.config.resync_interval))
}

pub fn error_policy<C>(
    nginxop: Arc<NginxOp>,
    err: &ReconcileError,
    context: Arc<OperatorContext<C>>,
) -> Action {
    error!(
        name = ?nginxop.metadata.name,
        namespace = ?nginxop.metadata.namespace,
        %err,
        "reconcile failed, retrying"
    );
    Action::requeue(context.config.retry_interval)
}

#[cfg(test)]
mod test {

    use std::time::Duration;

    use nginxop_metadata::{NginxOpSpec, ObjectKey};

    use crate::client::{Fault, LocalReconcileClient, Operation};

    use super::*;

    fn context() -> Arc<OperatorContext<LocalReconcileClient>> {
        let reconciler = NginxOpReconciler::new(
            Arc::new(LocalReconcileClient::new()),
            Arc::new(Scheme::nginxop()),
        );
        let config = OperatorConfig {
            resync_interval: Duration::from_secs(60),
            retry_interval: Duration::from_secs(5),
            ..Default::default()
        };
        Arc::new(OperatorContext::new(reconciler, config))
    }

    #[tokio::test]
    async fn test_success_requeues_after_resync() {
        //given
        let context = context();
        let key = ObjectKey::new("default", "web");
        let nginxop = context
            .reconciler
            .client()
            .create(NginxOp::new(&key, NginxOpSpec::default()))
            .await
            .expect("create");

        //when
        let action = reconcile_nginxop(Arc::new(nginxop), context.clone())
            .await
            .expect("reconcile");

        //then
        assert_eq!(action, Action::requeue(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_failure_requeues_after_retry() {
        //given
        let context = context();
        let key = ObjectKey::new("default", "web");
        let client = context.reconciler.client();
        let nginxop = client
            .create(NginxOp::new(&key, NginxOpSpec::default()))
            .await
            .expect("create");
        client
            .inject_fault(Operation::Apply, "Deployment", Fault::Unavailable)
            .await;
        let nginxop = Arc::new(nginxop);

        //when
        let err = reconcile_nginxop(nginxop.clone(), context.clone())
            .await
            .expect_err("apply fails");
        let action = error_policy(nginxop, &err, context);

        //then
        assert_eq!(err.failed_kind(), Some("Deployment"));
        assert_eq!(action, Action::requeue(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_object_without_key_is_ignored() {
        let context = context();
        let action = reconcile_nginxop(Arc::new(NginxOp::default()), context.clone())
            .await
            .expect("ignored");
        assert_eq!(action, Action::await_change());
        assert!(context.reconciler.client().history().await.is_empty());
    }
}
