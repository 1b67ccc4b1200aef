use async_trait::async_trait;
use tracing::debug;

use crate::{
    data::{
        datasources::entitlement_file_datasource::{
            EntitlementFileDatasourceImpl, EntitlementStateDatasource,
        },
        models::entitlement_state_model::EntitlementStateModel,
    },
    domain::{
        entities::{entitlement::EntitlementState, product_id::ProductId},
        repositories::entitlement_repository::EntitlementRepository,
    },
    errors::IapError,
};

pub struct EntitlementRepositoryImpl<D: EntitlementStateDatasource> {
    entitlement_state_datasource: D,
}

#[async_trait]
impl<D: EntitlementStateDatasource> EntitlementRepository for EntitlementRepositoryImpl<D> {
    async fn load(&self) -> Result<EntitlementState, IapError> {
        match self.entitlement_state_datasource.read_state().await? {
            Some(model) => Ok(EntitlementState::from(model)),
            None => {
                debug!("no persisted entitlement state, starting empty");
                Ok(EntitlementState::default())
            }
        }
    }

    async fn save(&self, state: &EntitlementState) -> Result<(), IapError> {
        self.entitlement_state_datasource
            .write_state(&EntitlementStateModel::from(state))
            .await
    }
}

impl EntitlementRepositoryImpl<EntitlementFileDatasourceImpl> {
    pub fn new(path: std::path::PathBuf) -> Self {
        Self {
            entitlement_state_datasource: EntitlementFileDatasourceImpl::new(path),
        }
    }
}

impl From<EntitlementStateModel> for EntitlementState {
    fn from(m: EntitlementStateModel) -> Self {
        EntitlementState {
            // Zero counts are never written, but tolerate hand-edited files.
            consumables: m.consumables.into_iter().filter(|(_, c)| *c > 0).collect(),
            unlocks: m.unlocks.into_iter().collect(),
            purchased_product_ids: m.purchased_product_ids.into_iter().map(ProductId).collect(),
        }
    }
}

impl From<&EntitlementState> for EntitlementStateModel {
    fn from(s: &EntitlementState) -> Self {
        EntitlementStateModel {
            consumables: s.consumables.clone(),
            unlocks: s.unlocks.iter().cloned().collect(),
            purchased_product_ids: s
                .purchased_product_ids
                .iter()
                .map(|id| id.0.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let repository = EntitlementRepositoryImpl::new(dir.path().join("state.json"));
        assert_eq!(repository.load().await.unwrap(), EntitlementState::default());
    }

    #[tokio::test]
    async fn test_saved_state_is_loaded_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let repository = EntitlementRepositoryImpl::new(path.clone());

        let mut state = EntitlementState::default();
        state.add_consumable("lives", 3);
        state.unlock("maps");
        state.record_purchase(&ProductId::from("com.app.maps"));
        repository.save(&state).await.unwrap();

        let reloaded = EntitlementRepositoryImpl::new(path).load().await.unwrap();
        assert_eq!(reloaded, state);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = EntitlementRepositoryImpl::new(path).load().await;
        assert!(matches!(
            result,
            Err(IapError::EntitlementStorageError { .. })
        ));
    }
}
