use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Persisted entitlement state.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementStateModel {
    #[serde(default)]
    pub(crate) consumables: BTreeMap<String, u32>,
    #[serde(default)]
    pub(crate) unlocks: Vec<String>,
    #[serde(default)]
    pub(crate) purchased_product_ids: Vec<String>,
}
