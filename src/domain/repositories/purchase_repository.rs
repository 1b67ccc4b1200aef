use async_trait::async_trait;

use crate::{
    domain::entities::{
        payment_transaction::{CompletedTransaction, PurchaseOutcome},
        product::ProductCatalog,
        product_id::ProductId,
    },
    errors::IapError,
};

/// Single point of contact with the external payment service.
///
/// Every operation resolves exactly once, when the payment service calls back
/// for it.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Whether the user is allowed to make payments on this device.
    fn can_make_payments(&self) -> bool;

    /// Looks up the given products in the payment service's catalog.
    async fn request_products(&self, product_ids: &[ProductId])
        -> Result<ProductCatalog, IapError>;

    /// Submits a payment for a single unit of the product.
    ///
    /// Fails with `PurchaseInProgress` if a purchase of the same product has
    /// not resolved yet.
    async fn purchase(&self, product_id: &ProductId) -> Result<PurchaseOutcome, IapError>;

    /// Asks the payment service to replay previously completed purchases.
    ///
    /// Fails with `RestoreInProgress` if a restore has not resolved yet.
    async fn restore_purchases(&self) -> Result<Vec<CompletedTransaction>, IapError>;

    /// Takes every transaction that completed with no in-flight operation
    /// waiting for it (approved deferred purchases, purchases interrupted by
    /// an earlier process exit, purchases made on another device). Does not
    /// wait; returns an empty list if nothing is queued.
    ///
    /// Transactions are queued from the moment the repository is created, so
    /// none are lost before the first call.
    async fn take_unsolicited(&self) -> Vec<CompletedTransaction>;
}
