use std::fmt::Debug;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IapError {
    #[error("Payments are disabled on this device.")]
    PaymentsDisabled,
    #[error("Product '{product_id}' is not available in the store.")]
    ProductNotAvailable { product_id: String },
    #[error("Product '{product_id}' is not listed in the bundled product catalog.")]
    UnknownProduct { product_id: String },
    #[error("A purchase of '{product_id}' is already in progress.")]
    PurchaseInProgress { product_id: String },
    #[error("A restore is already in progress.")]
    RestoreInProgress,
    #[error("Purchase of '{product_id}' was cancelled by the user.")]
    PurchaseCancelled { product_id: String },
    #[error("Purchase of '{product_id}' failed: {message}")]
    PurchaseFailed { product_id: String, message: String },
    #[error("Product request failed: {message}")]
    ProductRequestFailed { message: String },
    #[error("Restore failed: {message}")]
    RestoreFailed { message: String },
    #[error("Payment queue is unavailable: {message} ({debug})")]
    PaymentQueueUnavailable { message: String, debug: String },
    #[error("Not enough '{entitlement}' (requested {requested}, available {available}).")]
    InsufficientEntitlement {
        entitlement: String,
        requested: u32,
        available: u32,
    },
    #[error("Invalid product catalog resource: {message} ({debug})")]
    InvalidProductCatalog { message: String, debug: String },
    #[error("Failed to parse payment queue callback: {message} ({debug})")]
    CallbackParseError { message: String, debug: String },
    #[error("Failed to access entitlement state: {message} ({debug})")]
    EntitlementStorageError { message: String, debug: String },
    #[error("Missing configuration value '{key}'.")]
    MissingConfig { key: String },
}

impl IapError {
    pub(crate) fn invalid_catalog(message: &str) -> Self {
        Self::InvalidProductCatalog {
            message: message.to_string(),
            debug: String::new(),
        }
    }

    pub(crate) fn invalid_catalog_with_debug(message: &str, e: &impl Debug) -> Self {
        Self::InvalidProductCatalog {
            message: message.to_string(),
            debug: format!("{:?}", e),
        }
    }

    pub(crate) fn callback_parse_with_debug(message: &str, e: &impl Debug) -> Self {
        Self::CallbackParseError {
            message: message.to_string(),
            debug: format!("{:?}", e),
        }
    }

    pub(crate) fn queue_unavailable_with_debug(message: &str, e: &impl Debug) -> Self {
        Self::PaymentQueueUnavailable {
            message: message.to_string(),
            debug: format!("{:?}", e),
        }
    }
}
