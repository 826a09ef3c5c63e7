use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::{debug, trace};

use nginxop_metadata::ObjectKey;

use super::{ClientError, ManagedResource, ReconcileClient, key_of};

/// Client backed by the Kubernetes api server
#[derive(Clone)]
pub struct K8ReconcileClient {
    client: Client,
}

impl K8ReconcileClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: ManagedResource>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ReconcileClient for K8ReconcileClient {
    async fn retrieve_item<K>(&self, key: &ObjectKey) -> Result<Option<K>, ClientError>
    where
        K: ManagedResource,
    {
        trace!(kind = %K::kind(&()), %key, "retrieving");
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    async fn apply<K>(&self, value: K, field_owner: &str) -> Result<K, ClientError>
    where
        K: ManagedResource,
    {
        let key = key_of(&value)?;
        debug!(kind = %K::kind(&()), %key, field_owner, "applying");
        let params = PatchParams::apply(field_owner).force();
        Ok(self
            .api::<K>(&key.namespace)
            .patch(&key.name, &params, &Patch::Apply(&value))
            .await?)
    }

    async fn update_status<K>(&self, value: &K) -> Result<K, ClientError>
    where
        K: ManagedResource,
    {
        let key = key_of(value)?;
        debug!(kind = %K::kind(&()), %key, "updating status");
        let data = serde_json::to_vec(value)?;
        Ok(self
            .api::<K>(&key.namespace)
            .replace_status(&key.name, &PostParams::default(), data)
            .await?)
    }
}
