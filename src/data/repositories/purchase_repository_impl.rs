use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    data::datasources::payment_queue_datasource::{
        PaymentQueueDatasource, PaymentQueueEvent, PaymentQueueEvents, RequestId,
    },
    domain::{
        entities::{
            payment_transaction::{
                CompletedTransaction, PaymentTransaction, PurchaseOutcome, TransactionState,
            },
            product::ProductCatalog,
            product_id::ProductId,
        },
        repositories::purchase_repository::PurchaseRepository,
    },
    errors::IapError,
};

type Completion<T> = oneshot::Sender<Result<T, IapError>>;

struct PendingRestore {
    completion: Completion<Vec<CompletedTransaction>>,
    restored: Vec<CompletedTransaction>,
}

/// At most one completion per in-flight operation.
#[derive(Default)]
struct PendingCompletions {
    products: HashMap<RequestId, Completion<ProductCatalog>>,
    purchases: HashMap<ProductId, Completion<PurchaseOutcome>>,
    restore: Option<PendingRestore>,
}

/// State shared between the repository and the task draining the payment
/// queue's callbacks.
struct Shared<D: PaymentQueueDatasource> {
    payment_queue_datasource: D,
    pending: Mutex<PendingCompletions>,
    unsolicited: mpsc::UnboundedSender<CompletedTransaction>,
}

pub struct PurchaseRepositoryImpl<D: PaymentQueueDatasource> {
    shared: Arc<Shared<D>>,
    unsolicited: Mutex<mpsc::UnboundedReceiver<CompletedTransaction>>,
    next_request_id: AtomicU64,
    callback_listener: JoinHandle<()>,
}

#[async_trait]
impl<D: PaymentQueueDatasource> PurchaseRepository for PurchaseRepositoryImpl<D> {
    fn can_make_payments(&self) -> bool {
        self.shared.payment_queue_datasource.can_make_payments()
    }

    async fn request_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<ProductCatalog, IapError> {
        let request_id = RequestId(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        let (completion, result) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .await
            .products
            .insert(request_id, completion);

        debug!(?request_id, count = product_ids.len(), "requesting products");
        if let Err(e) = self
            .shared
            .payment_queue_datasource
            .start_products_request(request_id, product_ids.to_vec())
            .await
        {
            self.shared.pending.lock().await.products.remove(&request_id);
            return Err(e);
        }
        await_completion(result).await
    }

    async fn purchase(&self, product_id: &ProductId) -> Result<PurchaseOutcome, IapError> {
        if !self.can_make_payments() {
            return Err(IapError::PaymentsDisabled);
        }
        let (completion, result) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock().await;
            if pending.purchases.contains_key(product_id) {
                return Err(IapError::PurchaseInProgress {
                    product_id: product_id.to_string(),
                });
            }
            pending.purchases.insert(product_id.clone(), completion);
        }

        info!(%product_id, "submitting payment");
        if let Err(e) = self
            .shared
            .payment_queue_datasource
            .add_payment(product_id, 1)
            .await
        {
            self.shared.pending.lock().await.purchases.remove(product_id);
            return Err(e);
        }
        await_completion(result).await
    }

    async fn restore_purchases(&self) -> Result<Vec<CompletedTransaction>, IapError> {
        let (completion, result) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock().await;
            if pending.restore.is_some() {
                return Err(IapError::RestoreInProgress);
            }
            pending.restore = Some(PendingRestore {
                completion,
                restored: Vec::new(),
            });
        }

        info!("restoring completed transactions");
        if let Err(e) = self
            .shared
            .payment_queue_datasource
            .restore_completed_transactions()
            .await
        {
            self.shared.pending.lock().await.restore = None;
            return Err(e);
        }
        await_completion(result).await
    }

    async fn take_unsolicited(&self) -> Vec<CompletedTransaction> {
        let mut unsolicited = self.unsolicited.lock().await;
        let mut transactions = Vec::new();
        while let Ok(transaction) = unsolicited.try_recv() {
            transactions.push(transaction);
        }
        transactions
    }
}

impl<D: PaymentQueueDatasource> PurchaseRepositoryImpl<D> {
    /// Starts draining `events` on the current tokio runtime.
    ///
    /// events:
    ///   Receiving end of the channel `payment_queue_datasource` publishes its
    ///   callbacks on.
    pub(crate) fn new(payment_queue_datasource: D, mut events: PaymentQueueEvents) -> Self {
        // The receiver exists before the listener starts, so transactions
        // redelivered at launch are queued even if nobody asks for them yet.
        let (unsolicited_tx, unsolicited_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            payment_queue_datasource,
            pending: Mutex::new(PendingCompletions::default()),
            unsolicited: unsolicited_tx,
        });
        let listener_shared = shared.clone();
        let callback_listener = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                listener_shared.dispatch(event).await;
            }
            debug!("payment queue callback channel closed");
        });
        Self {
            shared,
            unsolicited: Mutex::new(unsolicited_rx),
            next_request_id: AtomicU64::new(1),
            callback_listener,
        }
    }
}

impl<D: PaymentQueueDatasource> Drop for PurchaseRepositoryImpl<D> {
    fn drop(&mut self) {
        self.callback_listener.abort();
    }
}

async fn await_completion<T>(result: oneshot::Receiver<Result<T, IapError>>) -> Result<T, IapError> {
    result.await.map_err(|e| {
        IapError::queue_unavailable_with_debug("callback listener stopped before completion", &e)
    })?
}

impl<D: PaymentQueueDatasource> Shared<D> {
    async fn dispatch(&self, event: PaymentQueueEvent) {
        match event {
            PaymentQueueEvent::ProductsReceived {
                request_id,
                products,
                invalid_product_ids,
            } => {
                if !invalid_product_ids.is_empty() {
                    warn!(?request_id, ?invalid_product_ids, "store did not recognize products");
                }
                self.complete_products_request(
                    request_id,
                    Ok(ProductCatalog {
                        products,
                        invalid_product_ids,
                    }),
                )
                .await;
            }
            PaymentQueueEvent::ProductsRequestFailed {
                request_id,
                message,
            } => {
                warn!(?request_id, %message, "products request failed");
                self.complete_products_request(
                    request_id,
                    Err(IapError::ProductRequestFailed { message }),
                )
                .await;
            }
            PaymentQueueEvent::TransactionsUpdated(transactions) => {
                for transaction in transactions {
                    self.dispatch_transaction(transaction).await;
                }
            }
            PaymentQueueEvent::RestoreFinished => {
                match self.pending.lock().await.restore.take() {
                    Some(r) => {
                        info!(count = r.restored.len(), "restore finished");
                        let _ = r.completion.send(Ok(r.restored));
                    }
                    None => debug!("restore finished with no restore pending"),
                }
            }
            PaymentQueueEvent::RestoreFailed { message } => {
                warn!(%message, "restore failed");
                if let Some(r) = self.pending.lock().await.restore.take() {
                    // Transactions restored before the failure were already
                    // finished, so they must still reach the application.
                    for transaction in r.restored {
                        self.publish_unsolicited(transaction);
                    }
                    let _ = r.completion.send(Err(IapError::RestoreFailed { message }));
                }
            }
        }
    }

    async fn dispatch_transaction(&self, transaction: PaymentTransaction) {
        let product_id = transaction.product_id.clone();
        match transaction.state {
            TransactionState::Purchasing => {
                debug!(%product_id, "transaction is purchasing");
            }
            TransactionState::Deferred => {
                info!(%product_id, "transaction is deferred");
                if let Some(completion) = self.pending.lock().await.purchases.remove(&product_id) {
                    let _ = completion.send(Ok(PurchaseOutcome::Deferred { product_id }));
                }
            }
            TransactionState::Purchased => {
                self.finish(&transaction).await;
                let completed = CompletedTransaction::from_transaction(transaction);
                let completion = self.pending.lock().await.purchases.remove(&product_id);
                match completion {
                    Some(completion) => {
                        info!(%product_id, "purchase completed");
                        // The caller stopped waiting; the purchase still has to
                        // be delivered.
                        if let Err(Ok(PurchaseOutcome::Purchased(completed))) =
                            completion.send(Ok(PurchaseOutcome::Purchased(completed)))
                        {
                            self.publish_unsolicited(completed);
                        }
                    }
                    None => self.publish_unsolicited(completed),
                }
            }
            TransactionState::Restored => {
                self.finish(&transaction).await;
                let completed = CompletedTransaction::from_transaction(transaction);
                let mut pending = self.pending.lock().await;
                match pending.restore.as_mut() {
                    Some(r) => r.restored.push(completed),
                    None => {
                        drop(pending);
                        self.publish_unsolicited(completed);
                    }
                }
            }
            TransactionState::Failed => {
                self.finish(&transaction).await;
                let error = match transaction.error {
                    Some(e) if e.is_cancelled => IapError::PurchaseCancelled {
                        product_id: product_id.to_string(),
                    },
                    Some(e) => IapError::PurchaseFailed {
                        product_id: product_id.to_string(),
                        message: e.message,
                    },
                    None => IapError::PurchaseFailed {
                        product_id: product_id.to_string(),
                        message: "unknown error".to_owned(),
                    },
                };
                match self.pending.lock().await.purchases.remove(&product_id) {
                    Some(completion) => {
                        info!(%product_id, %error, "purchase failed");
                        let _ = completion.send(Err(error));
                    }
                    None => warn!(%product_id, %error, "transaction failed with no purchase pending"),
                }
            }
        }
    }

    async fn complete_products_request(
        &self,
        request_id: RequestId,
        result: Result<ProductCatalog, IapError>,
    ) {
        match self.pending.lock().await.products.remove(&request_id) {
            Some(completion) => {
                let _ = completion.send(result);
            }
            None => warn!(?request_id, "products response with no request pending"),
        }
    }

    async fn finish(&self, transaction: &PaymentTransaction) {
        if let Err(e) = self
            .payment_queue_datasource
            .finish_transaction(&transaction.transaction_id)
            .await
        {
            warn!(
                transaction_id = %transaction.transaction_id,
                error = %e,
                "failed to finish transaction"
            );
        }
    }

    fn publish_unsolicited(&self, transaction: CompletedTransaction) {
        debug!(
            product_id = %transaction.product_id,
            transaction_id = %transaction.transaction_id,
            "publishing unsolicited transaction"
        );
        // The receiver lives as long as the repository; a failed send means
        // the repository is being dropped.
        if let Err(e) = self.unsolicited.send(transaction) {
            warn!(transaction_id = %e.0.transaction_id, "repository dropped, unsolicited transaction not delivered");
        }
    }
}
