use async_trait::async_trait;

use crate::{domain::entities::entitlement::EntitlementState, errors::IapError};

#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    /// Loads the persisted state, or an empty state if nothing was persisted
    /// yet.
    async fn load(&self) -> Result<EntitlementState, IapError>;

    async fn save(&self, state: &EntitlementState) -> Result<(), IapError>;
}
