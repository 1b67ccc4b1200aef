use std::path::PathBuf;

use async_trait::async_trait;

use crate::{data::models::entitlement_state_model::EntitlementStateModel, errors::IapError};

use super::utils::{read_json_file, write_json_file};

#[async_trait]
pub trait EntitlementStateDatasource: Send + Sync {
    async fn read_state(&self) -> Result<Option<EntitlementStateModel>, IapError>;

    async fn write_state(&self, state: &EntitlementStateModel) -> Result<(), IapError>;
}

pub struct EntitlementFileDatasourceImpl {
    path: PathBuf,
}

#[async_trait]
impl EntitlementStateDatasource for EntitlementFileDatasourceImpl {
    async fn read_state(&self) -> Result<Option<EntitlementStateModel>, IapError> {
        read_json_file(&self.path, storage_error).await
    }

    async fn write_state(&self, state: &EntitlementStateModel) -> Result<(), IapError> {
        write_json_file(&self.path, state, storage_error).await
    }
}

impl EntitlementFileDatasourceImpl {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn storage_error(message: &str, debug: String) -> IapError {
    IapError::EntitlementStorageError {
        message: message.to_owned(),
        debug,
    }
}
