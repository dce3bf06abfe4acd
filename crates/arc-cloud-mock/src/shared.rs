//! Cloud state shared by every handle of one provider

use crate::cloud::MockCloud;
use crate::store::StateStore;
use arc_cloud::Result;
use tokio::sync::Mutex;

pub(crate) struct Shared {
    cloud: Mutex<MockCloud>,
    store: Option<StateStore>,
}

impl Shared {
    pub(crate) fn new(cloud: MockCloud, store: Option<StateStore>) -> Self {
        Self {
            cloud: Mutex::new(cloud),
            store,
        }
    }

    /// Run a write against the cloud, log the call and persist on success
    pub(crate) async fn write<T, F>(&self, call: String, op: F) -> Result<T>
    where
        F: FnOnce(&mut MockCloud) -> Result<T> + Send,
        T: Send,
    {
        let mut cloud = self.cloud.lock().await;
        let out = op(&mut *cloud);
        if let Err(e) = &out {
            tracing::debug!(call = %call, error = %e, "mock write rejected");
            return out;
        }
        tracing::debug!(call = %call, "mock write");
        cloud.calls.push(call);
        if let Some(store) = &self.store {
            store.save(&*cloud).await?;
        }
        out
    }

    pub(crate) async fn read<T, F>(&self, op: F) -> T
    where
        F: FnOnce(&MockCloud) -> T + Send,
        T: Send,
    {
        let cloud = self.cloud.lock().await;
        op(&*cloud)
    }

    pub(crate) async fn snapshot(&self) -> MockCloud {
        self.cloud.lock().await.clone()
    }

    pub(crate) async fn update<F>(&self, op: F)
    where
        F: FnOnce(&mut MockCloud) + Send,
    {
        let mut cloud = self.cloud.lock().await;
        op(&mut *cloud);
    }
}
