use std::path::PathBuf;

use async_trait::async_trait;

use crate::{data::models::bundled_catalog_model::BundledCatalogModel, errors::IapError};

use super::utils::read_json_file;

#[async_trait]
pub(crate) trait BundledCatalogDatasource: Send + Sync {
    /// Reads the product list shipped with the application.
    async fn read_catalog(&self) -> Result<BundledCatalogModel, IapError>;
}

pub(crate) struct BundledCatalogDatasourceImpl {
    path: PathBuf,
}

#[async_trait]
impl BundledCatalogDatasource for BundledCatalogDatasourceImpl {
    async fn read_catalog(&self) -> Result<BundledCatalogModel, IapError> {
        read_json_file(&self.path, |message, debug| {
            IapError::InvalidProductCatalog {
                message: message.to_owned(),
                debug,
            }
        })
        .await?
        .ok_or_else(|| IapError::invalid_catalog_with_debug("resource is missing", &self.path))
    }
}

impl BundledCatalogDatasourceImpl {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}
