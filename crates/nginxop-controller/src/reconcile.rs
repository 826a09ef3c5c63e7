//!
//! # Reconciliation pass
//!
//! Drives the cluster toward what an NginxOp declares: fetch the parent,
//! derive its children, apply them in order and write the observed url back
//! to the parent's status. A pass has no memory of earlier passes; every
//! notification, stale or not, is handled the same way.
//!
use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use tracing::{debug, info, instrument, trace, warn};

use nginxop_metadata::{NginxOp, NginxOpStatus, ObjectKey};

use crate::client::{ManagedResource, ReconcileClient, SharedClient};
use crate::error::ReconcileError;
use crate::manifest::DesiredChildren;
use crate::scheme::Scheme;
use crate::status::status_for_ingress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// parent is gone, children are left to the garbage collector
    NotFound,
    Reconciled { status: NginxOpStatus },
}

pub struct NginxOpReconciler<C> {
    client: SharedClient<C>,
    scheme: Arc<Scheme>,
}

impl<C> Clone for NginxOpReconciler<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            scheme: self.scheme.clone(),
        }
    }
}

impl<C> NginxOpReconciler<C>
where
    C: ReconcileClient,
{
    pub fn new(client: SharedClient<C>, scheme: Arc<Scheme>) -> Self {
        Self { client, scheme }
    }

    pub fn client(&self) -> &SharedClient<C> {
        &self.client
    }

    #[instrument(skip(self), fields(nginxop = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcileError> {
        info!("new request");

        let Some(nginxop) = self
            .client
            .retrieve_item::<NginxOp>(key)
            .await
            .map_err(ReconcileError::Fetch)?
        else {
            info!("NginxOp not found, assuming it was deleted");
            return Ok(ReconcileOutcome::NotFound);
        };

        let children = DesiredChildren::derive(&nginxop, &self.scheme)?;
        let field_owner = key.name.as_str();

        self.apply_child::<Deployment>(children.deployment, field_owner)
            .await?;
        self.apply_child::<Service>(children.service, field_owner)
            .await?;
        let ingress = self.apply_ingress(key, children.ingress, field_owner).await?;

        let status = status_for_ingress(&ingress);
        debug!(url = %status.url, "projected status");

        let mut updated = nginxop;
        updated.status = Some(status.clone());
        self.client
            .update_status(&updated)
            .await
            .map_err(ReconcileError::StatusUpdate)?;

        info!("reconciled");
        Ok(ReconcileOutcome::Reconciled { status })
    }

    async fn apply_child<K>(&self, child: K, field_owner: &str) -> Result<K, ReconcileError>
    where
        K: ManagedResource + k8s_openapi::Resource,
    {
        trace!(kind = K::KIND, "applying child");
        self.client
            .apply(child, field_owner)
            .await
            .map_err(|source| ReconcileError::Apply {
                kind: K::KIND,
                source,
            })
    }

    // an Ingress that already exists is not fatal; the live object still
    // carries the load balancer assignment
    async fn apply_ingress(
        &self,
        key: &ObjectKey,
        ingress: Ingress,
        field_owner: &str,
    ) -> Result<Ingress, ReconcileError> {
        let fallback = ingress.clone();
        match self.apply_child::<Ingress>(ingress, field_owner).await {
            Ok(applied) => Ok(applied),
            Err(ReconcileError::Apply { source, .. }) if source.is_already_exists() => {
                warn!(%source, "Ingress already exists, continuing");
                let live = self
                    .client
                    .retrieve_item::<Ingress>(key)
                    .await
                    .map_err(|source| ReconcileError::Apply {
                        kind: <Ingress as k8s_openapi::Resource>::KIND,
                        source,
                    })?;
                Ok(live.unwrap_or(fallback))
            }
            Err(err) => Err(err),
        }
    }
}
