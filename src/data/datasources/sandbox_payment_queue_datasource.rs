//! In-memory payment queue.
//!
//! Emits the same callback sequence a platform transaction queue would, with a
//! scripted outcome per product. Useful for development and testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    domain::entities::{
        payment_transaction::{PaymentTransaction, TransactionError, TransactionState},
        product::Product,
        product_id::ProductId,
    },
    errors::IapError,
};

use super::payment_queue_datasource::{
    publish, PaymentQueueDatasource, PaymentQueueEvent, PaymentQueueEventSender, RequestId,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SandboxOutcome {
    Approve,
    Fail { message: String },
    Cancel,
    /// Held until `approve_deferred` or `decline_deferred` is called.
    Defer,
}

#[derive(Default)]
struct SandboxState {
    products: HashMap<ProductId, (Product, SandboxOutcome)>,
    /// Products replayed by a restore, in order.
    owned: Vec<ProductId>,
    deferred: HashMap<ProductId, String>,
    finished: Vec<String>,
    restore_failure: Option<String>,
    next_transaction: u64,
}

impl SandboxState {
    fn next_transaction_id(&mut self) -> String {
        self.next_transaction += 1;
        format!("sandbox-{}", self.next_transaction)
    }
}

pub struct SandboxPaymentQueueDatasourceImpl {
    events: PaymentQueueEventSender,
    payments_enabled: bool,
    state: Mutex<SandboxState>,
}

#[async_trait]
impl PaymentQueueDatasource for SandboxPaymentQueueDatasourceImpl {
    fn can_make_payments(&self) -> bool {
        self.payments_enabled
    }

    async fn start_products_request(
        &self,
        request_id: RequestId,
        product_ids: Vec<ProductId>,
    ) -> Result<(), IapError> {
        let state = self.state.lock().await;
        let (products, invalid_product_ids): (Vec<_>, Vec<_>) = product_ids
            .into_iter()
            .partition(|id| state.products.contains_key(id));
        let products = products
            .iter()
            .filter_map(|id| state.products.get(id).map(|(p, _)| p.clone()))
            .collect();
        publish(
            &self.events,
            PaymentQueueEvent::ProductsReceived {
                request_id,
                products,
                invalid_product_ids,
            },
        )
    }

    async fn add_payment(&self, product_id: &ProductId, quantity: u32) -> Result<(), IapError> {
        let mut state = self.state.lock().await;
        let transaction_id = state.next_transaction_id();
        let transaction = |tx_state: TransactionState, error: Option<TransactionError>| {
            PaymentTransaction {
                transaction_id: transaction_id.clone(),
                product_id: product_id.clone(),
                state: tx_state,
                quantity,
                transaction_date: Utc::now(),
                original_transaction_id: None,
                error,
            }
        };

        let Some((_, outcome)) = state.products.get(product_id) else {
            return publish(
                &self.events,
                PaymentQueueEvent::TransactionsUpdated(vec![transaction(
                    TransactionState::Failed,
                    Some(TransactionError {
                        is_cancelled: false,
                        message: format!("unknown product '{product_id}'"),
                    }),
                )]),
            );
        };
        let terminal = match outcome.clone() {
            SandboxOutcome::Approve => transaction(TransactionState::Purchased, None),
            SandboxOutcome::Fail { message } => transaction(
                TransactionState::Failed,
                Some(TransactionError {
                    is_cancelled: false,
                    message,
                }),
            ),
            SandboxOutcome::Cancel => transaction(
                TransactionState::Failed,
                Some(TransactionError {
                    is_cancelled: true,
                    message: "payment cancelled".to_owned(),
                }),
            ),
            SandboxOutcome::Defer => {
                state
                    .deferred
                    .insert(product_id.clone(), transaction_id.clone());
                transaction(TransactionState::Deferred, None)
            }
        };
        debug!(%product_id, state = ?terminal.state, "sandbox payment processed");
        publish(
            &self.events,
            PaymentQueueEvent::TransactionsUpdated(vec![transaction(
                TransactionState::Purchasing,
                None,
            )]),
        )?;
        publish(
            &self.events,
            PaymentQueueEvent::TransactionsUpdated(vec![terminal]),
        )
    }

    async fn restore_completed_transactions(&self) -> Result<(), IapError> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.restore_failure.clone() {
            return publish(&self.events, PaymentQueueEvent::RestoreFailed { message });
        }
        let owned = state.owned.clone();
        let restored: Vec<_> = owned
            .into_iter()
            .map(|product_id| PaymentTransaction {
                transaction_id: state.next_transaction_id(),
                original_transaction_id: Some(format!("sandbox-original-{product_id}")),
                product_id,
                state: TransactionState::Restored,
                quantity: 1,
                transaction_date: Utc::now(),
                error: None,
            })
            .collect();
        if !restored.is_empty() {
            publish(&self.events, PaymentQueueEvent::TransactionsUpdated(restored))?;
        }
        publish(&self.events, PaymentQueueEvent::RestoreFinished)
    }

    async fn finish_transaction(&self, transaction_id: &str) -> Result<(), IapError> {
        self.state
            .lock()
            .await
            .finished
            .push(transaction_id.to_owned());
        Ok(())
    }
}

impl SandboxPaymentQueueDatasourceImpl {
    pub fn new(events: PaymentQueueEventSender) -> Self {
        Self {
            events,
            payments_enabled: true,
            state: Mutex::new(SandboxState::default()),
        }
    }

    pub fn with_product(mut self, product: Product, outcome: SandboxOutcome) -> Self {
        self.state
            .get_mut()
            .products
            .insert(product.id.clone(), (product, outcome));
        self
    }

    /// Marks a product as previously purchased, so a restore replays it.
    pub fn with_owned_product(mut self, product_id: ProductId) -> Self {
        self.state.get_mut().owned.push(product_id);
        self
    }

    pub fn with_payments_enabled(mut self, enabled: bool) -> Self {
        self.payments_enabled = enabled;
        self
    }

    pub fn with_restore_failure(mut self, message: &str) -> Self {
        self.state.get_mut().restore_failure = Some(message.to_owned());
        self
    }

    /// Completes a deferred purchase, delivering it as a new transaction
    /// update.
    pub async fn approve_deferred(&self, product_id: &ProductId) -> Result<(), IapError> {
        self.resolve_deferred(product_id, TransactionState::Purchased, None)
            .await
    }

    pub async fn decline_deferred(&self, product_id: &ProductId) -> Result<(), IapError> {
        self.resolve_deferred(
            product_id,
            TransactionState::Failed,
            Some(TransactionError {
                is_cancelled: false,
                message: "purchase was declined".to_owned(),
            }),
        )
        .await
    }

    pub async fn finished_transaction_ids(&self) -> Vec<String> {
        self.state.lock().await.finished.clone()
    }

    async fn resolve_deferred(
        &self,
        product_id: &ProductId,
        new_state: TransactionState,
        error: Option<TransactionError>,
    ) -> Result<(), IapError> {
        let transaction_id = self
            .state
            .lock()
            .await
            .deferred
            .remove(product_id)
            .ok_or_else(|| IapError::PurchaseFailed {
                product_id: product_id.to_string(),
                message: "no deferred purchase".to_owned(),
            })?;
        publish(
            &self.events,
            PaymentQueueEvent::TransactionsUpdated(vec![PaymentTransaction {
                transaction_id,
                product_id: product_id.clone(),
                state: new_state,
                quantity: 1,
                transaction_date: Utc::now(),
                original_transaction_id: None,
                error,
            }]),
        )
    }
}
