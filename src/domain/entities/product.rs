use super::product_id::ProductId;

/// A product as returned by the payment service's catalog lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price_info: PriceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceInfo {
    /// Price in micro-units, where 1,000,000 micro-units equal one unit of
    /// the currency.
    pub price_micros: i64,
    /// ISO 4217 currency code (for example, 'USD').
    pub currency_iso_4217: String,
    /// Price already formatted for display in the user's locale, if the
    /// payment service provides one.
    pub formatted_price: Option<String>,
}

/// Result of a catalog lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
    /// Requested identifiers the payment service did not recognize.
    pub invalid_product_ids: Vec<ProductId>,
}
