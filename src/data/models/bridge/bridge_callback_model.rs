use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_repr::Deserialize_repr;

/// Callbacks delivered by the host that drives the platform transaction
/// queue.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub(crate) enum BridgeCallbackModel {
    ProductsResponse(ProductsResponseModel),
    ProductsRequestFailed(ProductsRequestFailedModel),
    UpdatedTransactions(UpdatedTransactionsModel),
    RestoreCompletedTransactionsFinished,
    RestoreCompletedTransactionsFailed(RestoreFailedModel),
    PaymentsAvailabilityChanged(PaymentsAvailabilityModel),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductsResponseModel {
    pub(crate) request_id: u64,
    pub(crate) products: Vec<ProductModel>,
    /// Identifiers the store did not recognize.
    #[serde(default)]
    pub(crate) invalid_product_identifiers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductModel {
    pub(crate) product_identifier: String,
    pub(crate) localized_title: String,
    pub(crate) localized_description: String,
    /// Decimal price in the storefront's currency, as a string to avoid
    /// floating point rounding (for example, '0.99').
    pub(crate) price: String,
    /// ISO 4217 currency code of the storefront.
    pub(crate) currency_code: String,
    pub(crate) formatted_price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductsRequestFailedModel {
    pub(crate) request_id: u64,
    pub(crate) localized_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdatedTransactionsModel {
    pub(crate) transactions: Vec<TransactionModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionModel {
    pub(crate) transaction_identifier: String,
    pub(crate) product_identifier: String,
    pub(crate) transaction_state: TransactionStateModel,
    /// The time the transaction was added to the queue, in milliseconds since
    /// the epoch (Jan 1, 1970).
    #[serde(with = "ts_milliseconds")]
    pub(crate) transaction_date: DateTime<Utc>,
    /// If not present, the quantity is 1.
    pub(crate) quantity: Option<u32>,
    /// Only present for restored transactions.
    pub(crate) original_transaction_identifier: Option<String>,
    /// Only present for failed transactions.
    pub(crate) error: Option<TransactionErrorModel>,
}

/// Raw values of the platform's transaction state.
#[derive(Debug, Deserialize_repr, PartialEq, Clone, Copy)]
#[repr(u8)]
pub(crate) enum TransactionStateModel {
    Purchasing = 0,
    Purchased = 1,
    Failed = 2,
    Restored = 3,
    Deferred = 4,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionErrorModel {
    pub(crate) code: i64,
    pub(crate) localized_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RestoreFailedModel {
    pub(crate) localized_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentsAvailabilityModel {
    pub(crate) can_make_payments: bool,
}
