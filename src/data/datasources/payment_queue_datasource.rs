use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::entities::{
        payment_transaction::PaymentTransaction, product::Product, product_id::ProductId,
    },
    errors::IapError,
};

/// Correlates a catalog lookup with the callback answering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Asynchronous callbacks of the payment service.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentQueueEvent {
    ProductsReceived {
        request_id: RequestId,
        products: Vec<Product>,
        invalid_product_ids: Vec<ProductId>,
    },
    ProductsRequestFailed {
        request_id: RequestId,
        message: String,
    },
    TransactionsUpdated(Vec<PaymentTransaction>),
    RestoreFinished,
    RestoreFailed {
        message: String,
    },
}

pub type PaymentQueueEventSender = mpsc::UnboundedSender<PaymentQueueEvent>;
pub type PaymentQueueEvents = mpsc::UnboundedReceiver<PaymentQueueEvent>;

/// Creates the channel a payment queue datasource publishes its callbacks on.
/// The receiving end goes to the purchase repository.
pub fn payment_queue_channel() -> (PaymentQueueEventSender, PaymentQueueEvents) {
    mpsc::unbounded_channel()
}

/// The external payment service's transaction queue.
///
/// Requests return as soon as they are handed to the queue; their results
/// arrive later as `PaymentQueueEvent`s.
#[async_trait]
pub trait PaymentQueueDatasource: Send + Sync + 'static {
    fn can_make_payments(&self) -> bool;

    async fn start_products_request(
        &self,
        request_id: RequestId,
        product_ids: Vec<ProductId>,
    ) -> Result<(), IapError>;

    async fn add_payment(&self, product_id: &ProductId, quantity: u32) -> Result<(), IapError>;

    async fn restore_completed_transactions(&self) -> Result<(), IapError>;

    /// Tells the queue the transaction's content was delivered, removing it
    /// from the queue. Unfinished transactions are redelivered on the next
    /// launch.
    async fn finish_transaction(&self, transaction_id: &str) -> Result<(), IapError>;
}

/// Lets the caller keep a handle on a datasource it hands to the purchase
/// repository (for example, to deliver host callbacks).
#[async_trait]
impl<T: PaymentQueueDatasource> PaymentQueueDatasource for Arc<T> {
    fn can_make_payments(&self) -> bool {
        (**self).can_make_payments()
    }

    async fn start_products_request(
        &self,
        request_id: RequestId,
        product_ids: Vec<ProductId>,
    ) -> Result<(), IapError> {
        (**self).start_products_request(request_id, product_ids).await
    }

    async fn add_payment(&self, product_id: &ProductId, quantity: u32) -> Result<(), IapError> {
        (**self).add_payment(product_id, quantity).await
    }

    async fn restore_completed_transactions(&self) -> Result<(), IapError> {
        (**self).restore_completed_transactions().await
    }

    async fn finish_transaction(&self, transaction_id: &str) -> Result<(), IapError> {
        (**self).finish_transaction(transaction_id).await
    }
}

pub(crate) fn publish(
    events: &PaymentQueueEventSender,
    event: PaymentQueueEvent,
) -> Result<(), IapError> {
    events.send(event).map_err(|e| {
        IapError::queue_unavailable_with_debug("event receiver was dropped", &e.to_string())
    })
}
