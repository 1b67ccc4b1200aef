use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    config::StoreConfig,
    data::{
        datasources::{
            entitlement_file_datasource::EntitlementFileDatasourceImpl,
            payment_queue_datasource::{PaymentQueueDatasource, PaymentQueueEvents},
        },
        repositories::{
            catalog_repository_impl::CatalogRepositoryImpl,
            entitlement_repository_impl::EntitlementRepositoryImpl,
            purchase_repository_impl::PurchaseRepositoryImpl,
        },
    },
    domain::{
        entities::{
            bundled_catalog::BundledCatalog,
            entitlement::{EntitlementGrant, EntitlementState},
            payment_transaction::{CompletedTransaction, PurchaseOutcome},
            product::Product,
            product_id::ProductId,
        },
        repositories::{
            catalog_repository::CatalogRepository, entitlement_repository::EntitlementRepository,
            purchase_repository::PurchaseRepository,
        },
    },
    errors::IapError,
};

/// Application-side view-model of the store.
///
/// Owns the user's entitlements and grants them for purchased and restored
/// products according to the bundled catalog. Every change is persisted and
/// published to UI subscribers.
///
/// Entitlements paid for are never withheld because of a storage failure:
/// they are published right away and saving is retried later (see
/// `has_unsaved_changes`).
pub struct StoreViewModel<P: PurchaseRepository, E: EntitlementRepository> {
    purchase_repository: P,
    entitlement_repository: E,
    catalog: BundledCatalog,
    products: Vec<Product>,
    state: EntitlementState,
    state_updates: watch::Sender<EntitlementState>,
    unsaved_changes: bool,
}

impl<P: PurchaseRepository, E: EntitlementRepository> StoreViewModel<P, E> {
    pub async fn new(
        purchase_repository: P,
        entitlement_repository: E,
        catalog: BundledCatalog,
    ) -> Result<Self, IapError> {
        let state = entitlement_repository.load().await?;
        let (state_updates, _) = watch::channel(state.clone());
        Ok(Self {
            purchase_repository,
            entitlement_repository,
            catalog,
            products: Vec::new(),
            state,
            state_updates,
            unsaved_changes: false,
        })
    }

    /// Receives the entitlement state after every change.
    pub fn subscribe(&self) -> watch::Receiver<EntitlementState> {
        self.state_updates.subscribe()
    }

    pub fn catalog(&self) -> &BundledCatalog {
        &self.catalog
    }

    /// Products available for sale, as of the last `load_products`.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn state(&self) -> &EntitlementState {
        &self.state
    }

    pub fn can_make_payments(&self) -> bool {
        self.purchase_repository.can_make_payments()
    }

    pub fn count(&self, entitlement: &str) -> u32 {
        self.state.count(entitlement)
    }

    pub fn is_unlocked(&self, entitlement: &str) -> bool {
        self.state.is_unlocked(entitlement)
    }

    pub fn is_product_purchased(&self, product_id: &ProductId) -> bool {
        self.state.is_product_purchased(product_id)
    }

    /// Whether granted entitlements are waiting to be persisted after a failed
    /// save.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Retries persisting entitlements whose save failed. A no-op when
    /// everything is saved.
    pub async fn save_unsaved_changes(&mut self) -> Result<(), IapError> {
        if !self.unsaved_changes {
            return Ok(());
        }
        self.entitlement_repository.save(&self.state).await?;
        self.unsaved_changes = false;
        info!("entitlement state saved after an earlier failure");
        Ok(())
    }

    /// Fetches the bundled catalog's products from the payment service.
    /// Products the store does not recognize are left out.
    pub async fn load_products(&mut self) -> Result<&[Product], IapError> {
        let product_ids = self.catalog.product_ids();
        if product_ids.is_empty() {
            self.products.clear();
            return Ok(&self.products);
        }
        let mut response = self
            .purchase_repository
            .request_products(&product_ids)
            .await?;
        if !response.invalid_product_ids.is_empty() {
            warn!(
                invalid_product_ids = ?response.invalid_product_ids,
                "bundled products are not available in the store"
            );
        }
        // Keep the bundled catalog's order for display.
        self.products = product_ids
            .iter()
            .filter_map(|id| {
                let index = response.products.iter().position(|p| &p.id == id)?;
                Some(response.products.swap_remove(index))
            })
            .collect();
        info!(count = self.products.len(), "products loaded");
        Ok(&self.products)
    }

    /// Buys one unit of a product returned by `load_products`.
    pub async fn purchase(&mut self, product_id: &ProductId) -> Result<PurchaseOutcome, IapError> {
        if !self.catalog.contains(product_id) {
            return Err(IapError::UnknownProduct {
                product_id: product_id.to_string(),
            });
        }
        if !self.products.iter().any(|p| &p.id == product_id) {
            return Err(IapError::ProductNotAvailable {
                product_id: product_id.to_string(),
            });
        }
        let outcome = self.purchase_repository.purchase(product_id).await?;
        match &outcome {
            PurchaseOutcome::Purchased(transaction) => {
                self.apply_transaction(transaction);
                self.commit_granted_state().await;
            }
            PurchaseOutcome::Deferred { product_id } => {
                info!(%product_id, "purchase awaits approval");
            }
        }
        Ok(outcome)
    }

    /// Restores previously purchased products. Only unlocks are restored;
    /// consumables are never credited twice.
    pub async fn restore_purchases(&mut self) -> Result<Vec<ProductId>, IapError> {
        let transactions = self.purchase_repository.restore_purchases().await?;
        let mut restored = Vec::new();
        for transaction in &transactions {
            self.apply_transaction(transaction);
            if !restored.contains(&transaction.product_id) {
                restored.push(transaction.product_id.clone());
            }
        }
        self.commit_granted_state().await;
        info!(count = restored.len(), "purchases restored");
        Ok(restored)
    }

    /// Grants every transaction that completed outside of `purchase` and
    /// `restore_purchases` since the last call. With nothing to apply, retries
    /// a failed save instead.
    /// Returns how many transactions were applied.
    pub async fn process_unsolicited_transactions(&mut self) -> Result<usize, IapError> {
        let transactions = self.purchase_repository.take_unsolicited().await;
        for transaction in &transactions {
            self.apply_transaction(transaction);
        }
        if transactions.is_empty() {
            self.save_unsaved_changes().await?;
        } else {
            self.commit_granted_state().await;
        }
        Ok(transactions.len())
    }

    /// Spends `amount` units of a consumable entitlement (for example, one
    /// life), returning how many remain. Nothing is spent unless the new
    /// state was saved.
    pub async fn consume(&mut self, entitlement: &str, amount: u32) -> Result<u32, IapError> {
        let mut next = self.state.clone();
        let remaining = next.consume(entitlement, amount)?;
        self.entitlement_repository.save(&next).await?;
        self.state = next;
        self.unsaved_changes = false;
        self.state_updates.send_replace(self.state.clone());
        Ok(remaining)
    }

    fn apply_transaction(&mut self, transaction: &CompletedTransaction) {
        let product_id = &transaction.product_id;
        match self.catalog.grant_for(product_id) {
            Some(EntitlementGrant::Consumable {
                entitlement,
                quantity,
            }) => {
                if transaction.is_restored {
                    debug!(%product_id, "ignoring restored consumable");
                    return;
                }
                let amount = quantity.saturating_mul(transaction.quantity);
                let total = self.state.add_consumable(entitlement, amount);
                info!(%product_id, %entitlement, amount, total, "consumable granted");
            }
            Some(EntitlementGrant::Unlock { entitlement }) => {
                self.state.unlock(entitlement);
                self.state.record_purchase(product_id);
                info!(%product_id, %entitlement, "unlock granted");
            }
            None => {
                if !self.catalog.contains(product_id) {
                    warn!(%product_id, "transaction for a product outside the bundled catalog");
                }
                self.state.record_purchase(product_id);
            }
        }
    }

    /// Publishes entitlements that were already paid for, then saves them.
    /// The transactions are finished at the store, so a failed save is kept
    /// for a later retry instead of being reported as a failed purchase.
    async fn commit_granted_state(&mut self) {
        self.state_updates.send_replace(self.state.clone());
        match self.entitlement_repository.save(&self.state).await {
            Ok(()) => self.unsaved_changes = false,
            Err(e) => {
                warn!(error = %e, "failed to save granted entitlements, will retry");
                self.unsaved_changes = true;
            }
        }
    }
}

impl<D: PaymentQueueDatasource>
    StoreViewModel<
        PurchaseRepositoryImpl<D>,
        EntitlementRepositoryImpl<EntitlementFileDatasourceImpl>,
    >
{
    /// Builds the view-model on top of a payment queue, loading the bundled
    /// catalog and the persisted entitlements named in `config`.
    ///
    /// Must be called within a tokio runtime; the payment queue's callbacks
    /// are drained on a background task.
    pub async fn from_config(
        config: &StoreConfig,
        payment_queue_datasource: D,
        payment_queue_events: PaymentQueueEvents,
    ) -> Result<Self, IapError> {
        let catalog = CatalogRepositoryImpl::new(config.product_catalog_path.clone())
            .load_bundled_catalog()
            .await?;
        Self::new(
            PurchaseRepositoryImpl::new(payment_queue_datasource, payment_queue_events),
            EntitlementRepositoryImpl::new(config.entitlement_state_path.clone()),
            catalog,
        )
        .await
    }
}
