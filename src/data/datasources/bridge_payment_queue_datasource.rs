use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    data::{
        datasources::utils::parse_price_micros,
        models::bridge::{
            bridge_callback_model as cb,
            bridge_command_model::{
                AddPaymentCommandModel, BridgeCommandModel, FinishTransactionCommandModel,
                RequestProductsCommandModel,
            },
        },
    },
    domain::entities::{
        payment_transaction::{PaymentTransaction, TransactionError, TransactionState},
        product::{PriceInfo, Product},
        product_id::ProductId,
    },
    errors::IapError,
};

use super::payment_queue_datasource::{
    publish, PaymentQueueDatasource, PaymentQueueEvent, PaymentQueueEventSender, RequestId,
};

/// Error code the platform uses for a payment the user cancelled.
const PAYMENT_CANCELLED_ERROR_CODE: i64 = 2;

/// Hands a serialized command to the host. The host reports failure to accept
/// the command with an error message.
pub type BridgeCommandSink = Arc<dyn Fn(String) -> Result<(), String> + Send + Sync>;

/// Payment queue driven by a host across a JSON boundary (FFI or IPC).
///
/// Commands go out through the `BridgeCommandSink`; the host delivers the
/// queue's callbacks back with `deliver_callback`.
pub struct BridgePaymentQueueDatasourceImpl {
    sink: BridgeCommandSink,
    events: PaymentQueueEventSender,
    can_make_payments: AtomicBool,
}

#[async_trait]
impl PaymentQueueDatasource for BridgePaymentQueueDatasourceImpl {
    fn can_make_payments(&self) -> bool {
        self.can_make_payments.load(Ordering::Relaxed)
    }

    async fn start_products_request(
        &self,
        request_id: RequestId,
        product_ids: Vec<ProductId>,
    ) -> Result<(), IapError> {
        self.send(BridgeCommandModel::RequestProducts(
            RequestProductsCommandModel {
                request_id: request_id.0,
                product_identifiers: product_ids.into_iter().map(|id| id.0).collect(),
            },
        ))
    }

    async fn add_payment(&self, product_id: &ProductId, quantity: u32) -> Result<(), IapError> {
        self.send(BridgeCommandModel::AddPayment(AddPaymentCommandModel {
            product_identifier: product_id.0.clone(),
            quantity,
        }))
    }

    async fn restore_completed_transactions(&self) -> Result<(), IapError> {
        self.send(BridgeCommandModel::RestoreCompletedTransactions)
    }

    async fn finish_transaction(&self, transaction_id: &str) -> Result<(), IapError> {
        self.send(BridgeCommandModel::FinishTransaction(
            FinishTransactionCommandModel {
                transaction_identifier: transaction_id.to_owned(),
            },
        ))
    }
}

impl BridgePaymentQueueDatasourceImpl {
    /// Payments stay disabled until the host reports availability.
    pub fn new(sink: BridgeCommandSink, events: PaymentQueueEventSender) -> Self {
        Self {
            sink,
            events,
            can_make_payments: AtomicBool::new(false),
        }
    }

    /// Entry point for the host: parses a raw callback and republishes it.
    ///
    /// callback:
    ///   JSON object with an 'event' tag, as produced by the host's
    ///   transaction queue observer.
    pub fn deliver_callback(&self, callback: &str) -> Result<(), IapError> {
        let model: cb::BridgeCallbackModel = serde_json::from_str(callback)
            .map_err(|e| IapError::callback_parse_with_debug("invalid callback", &e))?;
        let event = match model {
            cb::BridgeCallbackModel::PaymentsAvailabilityChanged(m) => {
                debug!(can_make_payments = m.can_make_payments, "payments availability changed");
                self.can_make_payments
                    .store(m.can_make_payments, Ordering::Relaxed);
                return Ok(());
            }
            cb::BridgeCallbackModel::ProductsResponse(m) => {
                let mut invalid_product_ids: Vec<ProductId> = m
                    .invalid_product_identifiers
                    .into_iter()
                    .map(ProductId)
                    .collect();
                // A product that cannot be sold as described is reported as
                // invalid; the request itself must still resolve.
                let mut products = Vec::with_capacity(m.products.len());
                for product in m.products {
                    match Product::from_bridge_model(product) {
                        Ok(product) => products.push(product),
                        Err((product_id, e)) => {
                            warn!(%product_id, error = %e, "dropping product with unusable details");
                            invalid_product_ids.push(product_id);
                        }
                    }
                }
                PaymentQueueEvent::ProductsReceived {
                    request_id: RequestId(m.request_id),
                    products,
                    invalid_product_ids,
                }
            }
            cb::BridgeCallbackModel::ProductsRequestFailed(m) => {
                PaymentQueueEvent::ProductsRequestFailed {
                    request_id: RequestId(m.request_id),
                    message: m.localized_description,
                }
            }
            cb::BridgeCallbackModel::UpdatedTransactions(m) => PaymentQueueEvent::TransactionsUpdated(
                m.transactions
                    .into_iter()
                    .map(PaymentTransaction::from_bridge_model)
                    .collect(),
            ),
            cb::BridgeCallbackModel::RestoreCompletedTransactionsFinished => {
                PaymentQueueEvent::RestoreFinished
            }
            cb::BridgeCallbackModel::RestoreCompletedTransactionsFailed(m) => {
                PaymentQueueEvent::RestoreFailed {
                    message: m.localized_description,
                }
            }
        };
        publish(&self.events, event)
    }

    fn send(&self, command: BridgeCommandModel) -> Result<(), IapError> {
        let payload = serde_json::to_string(&command)
            .map_err(|e| IapError::queue_unavailable_with_debug("failed to encode command", &e))?;
        (self.sink)(payload).map_err(|e| {
            warn!(error = %e, "host rejected payment queue command");
            IapError::queue_unavailable_with_debug("host rejected command", &e)
        })
    }
}

impl Product {
    fn from_bridge_model(m: cb::ProductModel) -> Result<Self, (ProductId, IapError)> {
        let Some(price_micros) = parse_price_micros(&m.price) else {
            return Err((
                ProductId(m.product_identifier),
                IapError::callback_parse_with_debug("invalid product price", &m.price),
            ));
        };
        Ok(Product {
            id: ProductId(m.product_identifier),
            title: m.localized_title,
            description: m.localized_description,
            price_info: PriceInfo {
                price_micros,
                currency_iso_4217: m.currency_code,
                formatted_price: m.formatted_price,
            },
        })
    }
}

impl PaymentTransaction {
    fn from_bridge_model(m: cb::TransactionModel) -> Self {
        PaymentTransaction {
            transaction_id: m.transaction_identifier,
            product_id: ProductId(m.product_identifier),
            state: match m.transaction_state {
                cb::TransactionStateModel::Purchasing => TransactionState::Purchasing,
                cb::TransactionStateModel::Purchased => TransactionState::Purchased,
                cb::TransactionStateModel::Failed => TransactionState::Failed,
                cb::TransactionStateModel::Restored => TransactionState::Restored,
                cb::TransactionStateModel::Deferred => TransactionState::Deferred,
            },
            quantity: m.quantity.unwrap_or(1),
            transaction_date: m.transaction_date,
            original_transaction_id: m.original_transaction_identifier,
            error: m.error.map(|e| TransactionError {
                is_cancelled: e.code == PAYMENT_CANCELLED_ERROR_CODE,
                message: e.localized_description,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::data::datasources::payment_queue_datasource::payment_queue_channel;

    fn recording_sink() -> (BridgeCommandSink, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let sink: BridgeCommandSink = Arc::new(move |payload: String| -> Result<(), String> {
            sent_clone.lock().unwrap().push(payload);
            Ok(())
        });
        (sink, sent)
    }

    #[tokio::test]
    async fn test_commands_are_serialized_for_the_host() {
        let (tx, _rx) = payment_queue_channel();
        let (sink, sent) = recording_sink();
        let datasource = BridgePaymentQueueDatasourceImpl::new(sink, tx);

        datasource
            .start_products_request(RequestId(7), vec![ProductId::from("com.app.lives")])
            .await
            .unwrap();
        datasource
            .add_payment(&ProductId::from("com.app.lives"), 1)
            .await
            .unwrap();
        datasource.restore_completed_transactions().await.unwrap();
        datasource.finish_transaction("1000").await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(
            sent[0],
            r#"{"command":"requestProducts","requestId":7,"productIdentifiers":["com.app.lives"]}"#
        );
        assert_eq!(
            sent[1],
            r#"{"command":"addPayment","productIdentifier":"com.app.lives","quantity":1}"#
        );
        assert_eq!(sent[2], r#"{"command":"restoreCompletedTransactions"}"#);
        assert_eq!(
            sent[3],
            r#"{"command":"finishTransaction","transactionIdentifier":"1000"}"#
        );
    }

    #[tokio::test]
    async fn test_rejected_command_is_an_error() {
        let (tx, _rx) = payment_queue_channel();
        let sink: BridgeCommandSink =
            Arc::new(|_: String| -> Result<(), String> { Err("queue not attached".to_owned()) });
        let datasource = BridgePaymentQueueDatasourceImpl::new(sink, tx);

        let result = datasource.restore_completed_transactions().await;
        assert!(matches!(
            result,
            Err(IapError::PaymentQueueUnavailable { .. })
        ));
    }

    #[test]
    fn test_products_response_is_republished() {
        let (tx, mut rx) = payment_queue_channel();
        let (sink, _) = recording_sink();
        let datasource = BridgePaymentQueueDatasourceImpl::new(sink, tx);

        datasource
            .deliver_callback(
                r#"{
                    "event": "productsResponse",
                    "requestId": 3,
                    "products": [{
                        "productIdentifier": "com.app.maps",
                        "localizedTitle": "Maps",
                        "localizedDescription": "Unlock all maps",
                        "price": "2.99",
                        "currencyCode": "EUR",
                        "formattedPrice": "2,99 €"
                    }],
                    "invalidProductIdentifiers": ["com.app.gone"]
                }"#,
            )
            .unwrap();

        let event = rx.try_recv().unwrap();
        let PaymentQueueEvent::ProductsReceived {
            request_id,
            products,
            invalid_product_ids,
        } = event
        else {
            panic!("unexpected event: {event:?}");
        };
        assert_eq!(request_id, RequestId(3));
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price_info.price_micros, 2_990_000);
        assert_eq!(products[0].price_info.currency_iso_4217, "EUR");
        assert_eq!(invalid_product_ids, vec![ProductId::from("com.app.gone")]);
    }

    #[test]
    fn test_transaction_states_use_platform_raw_values() {
        let (tx, mut rx) = payment_queue_channel();
        let (sink, _) = recording_sink();
        let datasource = BridgePaymentQueueDatasourceImpl::new(sink, tx);

        datasource
            .deliver_callback(
                r#"{
                    "event": "updatedTransactions",
                    "transactions": [
                        {"transactionIdentifier": "1", "productIdentifier": "a", "transactionState": 1, "transactionDate": 1700000000000},
                        {"transactionIdentifier": "2", "productIdentifier": "b", "transactionState": 2, "transactionDate": 1700000000000,
                         "error": {"code": 2, "localizedDescription": "Cancelled"}},
                        {"transactionIdentifier": "3", "productIdentifier": "c", "transactionState": 3, "transactionDate": 1700000000000,
                         "originalTransactionIdentifier": "0", "quantity": 1}
                    ]
                }"#,
            )
            .unwrap();

        let PaymentQueueEvent::TransactionsUpdated(transactions) = rx.try_recv().unwrap() else {
            panic!("expected transactions update");
        };
        assert_eq!(transactions[0].state, TransactionState::Purchased);
        assert_eq!(transactions[0].quantity, 1);
        assert_eq!(transactions[1].state, TransactionState::Failed);
        assert!(transactions[1].error.as_ref().unwrap().is_cancelled);
        assert_eq!(transactions[2].state, TransactionState::Restored);
        assert_eq!(
            transactions[2].original_transaction_id.as_deref(),
            Some("0")
        );
    }

    #[test]
    fn test_availability_callback_toggles_payments() {
        let (tx, mut rx) = payment_queue_channel();
        let (sink, _) = recording_sink();
        let datasource = BridgePaymentQueueDatasourceImpl::new(sink, tx);
        assert!(!datasource.can_make_payments());

        datasource
            .deliver_callback(r#"{"event": "paymentsAvailabilityChanged", "canMakePayments": true}"#)
            .unwrap();

        assert!(datasource.can_make_payments());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_callbacks_are_rejected() {
        let (tx, mut rx) = payment_queue_channel();
        let (sink, _) = recording_sink();
        let datasource = BridgePaymentQueueDatasourceImpl::new(sink, tx);

        for callback in [
            "not json",
            r#"{"event": "somethingElse"}"#,
            r#"{"event": "updatedTransactions", "transactions": [{"transactionIdentifier": "1", "productIdentifier": "a", "transactionState": 9, "transactionDate": 0}]}"#,
            r#"{"event": "productsResponse", "products": []}"#,
        ] {
            assert!(matches!(
                datasource.deliver_callback(callback),
                Err(IapError::CallbackParseError { .. })
            ));
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_product_with_unusable_price_is_reported_invalid() {
        let (tx, mut rx) = payment_queue_channel();
        let (sink, _) = recording_sink();
        let datasource = BridgePaymentQueueDatasourceImpl::new(sink, tx);

        datasource
            .deliver_callback(
                r#"{
                    "event": "productsResponse",
                    "requestId": 4,
                    "products": [
                        {"productIdentifier": "a", "localizedTitle": "A", "localizedDescription": "", "price": "0,99", "currencyCode": "EUR"},
                        {"productIdentifier": "b", "localizedTitle": "B", "localizedDescription": "", "price": "0.99", "currencyCode": "EUR"}
                    ],
                    "invalidProductIdentifiers": ["c"]
                }"#,
            )
            .unwrap();

        let PaymentQueueEvent::ProductsReceived {
            request_id,
            products,
            invalid_product_ids,
        } = rx.try_recv().unwrap()
        else {
            panic!("expected products response");
        };
        assert_eq!(request_id, RequestId(4));
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, ProductId::from("b"));
        assert_eq!(
            invalid_product_ids,
            vec![ProductId::from("c"), ProductId::from("a")]
        );
    }
}
