use chrono::{DateTime, Utc};

use super::product_id::ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// The payment is being processed by the payment service.
    Purchasing,
    /// The payment was charged. The transaction must be finished once the
    /// content is delivered.
    Purchased,
    /// The payment did not go through (including user cancellation).
    Failed,
    /// A previous purchase was restored. The transaction must be finished
    /// once the content is delivered.
    Restored,
    /// The payment awaits external approval (for example, a parent approving
    /// a child's purchase). A later update moves it to purchased or failed.
    Deferred,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionError {
    pub is_cancelled: bool,
    pub message: String,
}

/// A transaction update delivered by the payment service's transaction
/// queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransaction {
    pub transaction_id: String,
    pub product_id: ProductId,
    pub state: TransactionState,
    pub quantity: u32,
    pub transaction_date: DateTime<Utc>,
    /// For restored transactions, the transaction that originally purchased
    /// the product.
    pub original_transaction_id: Option<String>,
    pub error: Option<TransactionError>,
}

/// A purchased or restored transaction, after it was finished with the
/// payment service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransaction {
    pub transaction_id: String,
    pub product_id: ProductId,
    pub quantity: u32,
    pub transaction_date: DateTime<Utc>,
    pub is_restored: bool,
}

impl CompletedTransaction {
    pub(crate) fn from_transaction(t: PaymentTransaction) -> Self {
        Self {
            is_restored: t.state == TransactionState::Restored,
            transaction_id: t.transaction_id,
            product_id: t.product_id,
            quantity: t.quantity.max(1),
            transaction_date: t.transaction_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Purchased(CompletedTransaction),
    /// The purchase awaits approval. If it gets approved, the transaction
    /// arrives later as an unsolicited transaction.
    Deferred { product_id: ProductId },
}
