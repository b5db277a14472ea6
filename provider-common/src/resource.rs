//! Resource contract
//!
//! Each managed resource type maps a [`ResourceData`] onto calls against a
//! remote API. `M` is the provider's configured client bundle.

use crate::error::ProviderResult;
use crate::schema::ResourceSchema;
use crate::state::ResourceData;
use async_trait::async_trait;

#[async_trait]
pub trait Resource<M: Send + Sync + 'static>: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &str;

    /// Get the schema for this resource
    fn schema(&self) -> ResourceSchema;

    /// Create the remote object and set the id
    async fn create(&self, d: &mut ResourceData, meta: &M) -> ProviderResult<()>;

    /// Refresh from the remote object; clear the id when it is gone
    async fn read(&self, d: &mut ResourceData, meta: &M) -> ProviderResult<()>;

    /// Push planned changes to the remote object
    async fn update(&self, d: &mut ResourceData, meta: &M) -> ProviderResult<()>;

    /// Delete the remote object; an already missing object is not an error
    async fn delete(&self, d: &mut ResourceData, meta: &M) -> ProviderResult<()>;

    /// Whether the remote object still exists
    async fn exists(&self, d: &mut ResourceData, meta: &M) -> ProviderResult<bool> {
        let _ = (d, meta);
        Ok(true)
    }

    /// Prepare state for import; the id alone is enough by default
    async fn import(&self, d: &mut ResourceData, meta: &M) -> ProviderResult<()> {
        let _ = (d, meta);
        Ok(())
    }
}
