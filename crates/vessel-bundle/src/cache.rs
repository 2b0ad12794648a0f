//! Encrypted bundles kept in a [`ContainerStore`]

use tracing::{debug, instrument};
use vessel_storage::ContainerStore;

use crate::bundle::Bundle;
use crate::error::BundleResult;

/// Stores bundles in their encrypted `STIM` form under a name.
///
/// The store only ever sees ciphertext.
pub struct BundleCache<S> {
    store: S,
}

impl<S: ContainerStore> BundleCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    #[instrument(skip(self, bundle, password))]
    pub async fn save(&self, name: &str, bundle: &Bundle, password: &str) -> BundleResult<()> {
        let bytes = bundle.to_encrypted(password)?;
        self.store.put(name, &bytes).await?;
        debug!(bytes = bytes.len(), "bundle cached");
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn load(&self, name: &str, password: &str) -> BundleResult<Bundle> {
        let bytes = self.store.get(name).await?;
        Bundle::from_encrypted(&bytes, password)
    }

    pub async fn contains(&self, name: &str) -> BundleResult<bool> {
        Ok(self.store.exists(name).await?)
    }

    pub async fn remove(&self, name: &str) -> BundleResult<()> {
        Ok(self.store.delete(name).await?)
    }

    pub async fn names(&self) -> BundleResult<Vec<String>> {
        Ok(self.store.list().await?)
    }
}
