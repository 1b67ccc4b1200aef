use serde::Deserialize;

/// Product list bundled with the application. Either a bare list of product
/// identifiers, or a list of products with the entitlement each one grants.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum BundledCatalogModel {
    ProductIds(Vec<String>),
    Products { products: Vec<BundledProductModel> },
}

#[derive(Debug, Deserialize)]
pub(crate) struct BundledProductModel {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) grant: Option<GrantModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum GrantModel {
    Consumable { entitlement: String, quantity: u32 },
    Unlock { entitlement: String },
}
