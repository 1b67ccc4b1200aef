use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::IapError;

pub const PRODUCT_CATALOG_PATH_KEY: &str = "IAP_PRODUCT_CATALOG_PATH";
pub const ENTITLEMENT_STATE_PATH_KEY: &str = "IAP_ENTITLEMENT_STATE_PATH";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Product list bundled with the application (JSON).
    pub product_catalog_path: PathBuf,
    /// Where the user's entitlements are persisted (JSON). Created on first
    /// save.
    pub entitlement_state_path: PathBuf,
}

impl StoreConfig {
    pub fn new(
        product_catalog_path: impl Into<PathBuf>,
        entitlement_state_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            product_catalog_path: product_catalog_path.into(),
            entitlement_state_path: entitlement_state_path.into(),
        }
    }

    /// Reads the configuration from the environment, after loading a `.env`
    /// file from the working directory if one exists.
    pub fn from_env() -> Result<Self, IapError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            product_catalog_path: read_var(PRODUCT_CATALOG_PATH_KEY)?.into(),
            entitlement_state_path: read_var(ENTITLEMENT_STATE_PATH_KEY)?.into(),
        })
    }
}

fn read_var(key: &str) -> Result<String, IapError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| IapError::MissingConfig {
            key: key.to_owned(),
        })
}
