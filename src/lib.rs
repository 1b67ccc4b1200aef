pub(crate) mod data {
    pub(crate) mod datasources {
        pub(crate) mod bridge_payment_queue_datasource;
        pub(crate) mod bundled_catalog_datasource;
        pub(crate) mod entitlement_file_datasource;
        pub(crate) mod payment_queue_datasource;
        pub(crate) mod sandbox_payment_queue_datasource;
        mod utils;
    }
    pub(crate) mod models {
        pub(crate) mod bridge {
            pub(crate) mod bridge_callback_model;
            pub(crate) mod bridge_command_model;
        }
        pub(crate) mod bundled_catalog_model;
        pub(crate) mod entitlement_state_model;
    }
    pub(crate) mod repositories {
        pub(crate) mod catalog_repository_impl;
        pub(crate) mod entitlement_repository_impl;
        pub(crate) mod purchase_repository_impl;
    }
}

pub mod domain {
    pub mod entities {
        pub mod bundled_catalog;
        pub mod entitlement;
        pub mod payment_transaction;
        pub mod product;
        pub mod product_id;
    }
    pub mod repositories {
        pub mod catalog_repository;
        pub mod entitlement_repository;
        pub mod purchase_repository;
    }
}

/// Payment queue backends the view-model can be built on.
pub mod payment_queue {
    pub use crate::data::datasources::{
        bridge_payment_queue_datasource::{BridgeCommandSink, BridgePaymentQueueDatasourceImpl},
        payment_queue_datasource::{
            payment_queue_channel, PaymentQueueDatasource, PaymentQueueEvent,
            PaymentQueueEventSender, PaymentQueueEvents, RequestId,
        },
        sandbox_payment_queue_datasource::{SandboxOutcome, SandboxPaymentQueueDatasourceImpl},
    };
}

pub mod config;
pub mod errors;
pub mod util;
