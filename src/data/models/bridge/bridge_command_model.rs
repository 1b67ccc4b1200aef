use serde::Serialize;

/// Requests sent to the host that drives the platform transaction queue.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "command", rename_all = "camelCase")]
pub(crate) enum BridgeCommandModel {
    RequestProducts(RequestProductsCommandModel),
    AddPayment(AddPaymentCommandModel),
    RestoreCompletedTransactions,
    FinishTransaction(FinishTransactionCommandModel),
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestProductsCommandModel {
    pub(crate) request_id: u64,
    pub(crate) product_identifiers: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddPaymentCommandModel {
    pub(crate) product_identifier: String,
    pub(crate) quantity: u32,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FinishTransactionCommandModel {
    pub(crate) transaction_identifier: String,
}
