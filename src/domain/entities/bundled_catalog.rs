use super::{entitlement::EntitlementGrant, product_id::ProductId};

/// Product list shipped with the application, with the entitlement each
/// product grants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundledCatalog {
    pub entries: Vec<BundledCatalogEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundledCatalogEntry {
    pub product_id: ProductId,
    /// Products without a grant are still purchasable, but only recorded as
    /// owned.
    pub grant: Option<EntitlementGrant>,
}

impl BundledCatalog {
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.entries.iter().map(|e| e.product_id.clone()).collect()
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.entries.iter().any(|e| &e.product_id == product_id)
    }

    pub fn grant_for(&self, product_id: &ProductId) -> Option<&EntitlementGrant> {
        self.entries
            .iter()
            .find(|e| &e.product_id == product_id)
            .and_then(|e| e.grant.as_ref())
    }
}
