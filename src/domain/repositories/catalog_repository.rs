use async_trait::async_trait;

use crate::{domain::entities::bundled_catalog::BundledCatalog, errors::IapError};

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn load_bundled_catalog(&self) -> Result<BundledCatalog, IapError>;
}
