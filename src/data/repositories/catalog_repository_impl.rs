use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    data::{
        datasources::bundled_catalog_datasource::{
            BundledCatalogDatasource, BundledCatalogDatasourceImpl,
        },
        models::bundled_catalog_model::{BundledCatalogModel, BundledProductModel, GrantModel},
    },
    domain::{
        entities::{
            bundled_catalog::{BundledCatalog, BundledCatalogEntry},
            entitlement::EntitlementGrant,
            product_id::ProductId,
        },
        repositories::catalog_repository::CatalogRepository,
    },
    errors::IapError,
};

pub(crate) struct CatalogRepositoryImpl<D: BundledCatalogDatasource> {
    bundled_catalog_datasource: D,
}

#[async_trait]
impl<D: BundledCatalogDatasource> CatalogRepository for CatalogRepositoryImpl<D> {
    async fn load_bundled_catalog(&self) -> Result<BundledCatalog, IapError> {
        let model = self.bundled_catalog_datasource.read_catalog().await?;
        BundledCatalog::from_model(model)
    }
}

impl CatalogRepositoryImpl<BundledCatalogDatasourceImpl> {
    pub(crate) fn new(path: std::path::PathBuf) -> Self {
        Self {
            bundled_catalog_datasource: BundledCatalogDatasourceImpl::new(path),
        }
    }
}

impl BundledCatalog {
    fn from_model(model: BundledCatalogModel) -> Result<Self, IapError> {
        let products = match model {
            BundledCatalogModel::ProductIds(ids) => ids
                .into_iter()
                .map(|id| BundledProductModel { id, grant: None })
                .collect(),
            BundledCatalogModel::Products { products } => products,
        };

        let mut seen = HashSet::new();
        let entries = products
            .into_iter()
            .map(|p| {
                let id = p.id.trim();
                if id.is_empty() {
                    return Err(IapError::invalid_catalog("product id is empty"));
                }
                if !seen.insert(id.to_owned()) {
                    return Err(IapError::invalid_catalog_with_debug(
                        "duplicate product id",
                        &id,
                    ));
                }
                Ok(BundledCatalogEntry {
                    grant: p.grant.map(|g| EntitlementGrant::from_model(g, id)).transpose()?,
                    product_id: ProductId(id.to_owned()),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BundledCatalog { entries })
    }
}

impl EntitlementGrant {
    fn from_model(model: GrantModel, product_id: &str) -> Result<Self, IapError> {
        let grant = match model {
            GrantModel::Consumable {
                entitlement,
                quantity,
            } => {
                if quantity == 0 {
                    return Err(IapError::invalid_catalog_with_debug(
                        "consumable quantity must be positive",
                        &product_id,
                    ));
                }
                EntitlementGrant::Consumable {
                    entitlement,
                    quantity,
                }
            }
            GrantModel::Unlock { entitlement } => EntitlementGrant::Unlock { entitlement },
        };
        let (EntitlementGrant::Consumable { entitlement, .. }
        | EntitlementGrant::Unlock { entitlement }) = &grant;
        if entitlement.trim().is_empty() {
            return Err(IapError::invalid_catalog_with_debug(
                "entitlement name is empty",
                &product_id,
            ));
        }
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCatalogDatasource(&'static str);

    #[async_trait]
    impl BundledCatalogDatasource for StaticCatalogDatasource {
        async fn read_catalog(&self) -> Result<BundledCatalogModel, IapError> {
            serde_json::from_str(self.0)
                .map_err(|e| IapError::invalid_catalog_with_debug("failed to parse", &e))
        }
    }

    async fn load(json: &'static str) -> Result<BundledCatalog, IapError> {
        CatalogRepositoryImpl {
            bundled_catalog_datasource: StaticCatalogDatasource(json),
        }
        .load_bundled_catalog()
        .await
    }

    #[tokio::test]
    async fn test_bare_product_id_list() {
        let catalog = load(r#"["com.app.lives.five", "com.app.maps"]"#).await.unwrap();
        assert_eq!(
            catalog.product_ids(),
            vec![
                ProductId::from("com.app.lives.five"),
                ProductId::from("com.app.maps")
            ]
        );
        assert!(catalog.grant_for(&ProductId::from("com.app.maps")).is_none());
    }

    #[tokio::test]
    async fn test_product_ids_are_trimmed() {
        let catalog = load(r#"[" com.app.maps\n"]"#).await.unwrap();
        assert_eq!(catalog.product_ids(), vec![ProductId::from("com.app.maps")]);
    }

    #[tokio::test]
    async fn test_products_with_grants() {
        let catalog = load(
            r#"{"products": [
                {"id": "com.app.lives.five", "grant": {"consumable": {"entitlement": "lives", "quantity": 5}}},
                {"id": "com.app.maps", "grant": {"unlock": {"entitlement": "maps"}}},
                {"id": "com.app.tip"}
            ]}"#,
        )
        .await
        .unwrap();
        assert_eq!(
            catalog.grant_for(&ProductId::from("com.app.lives.five")),
            Some(&EntitlementGrant::Consumable {
                entitlement: "lives".to_owned(),
                quantity: 5
            })
        );
        assert_eq!(
            catalog.grant_for(&ProductId::from("com.app.maps")),
            Some(&EntitlementGrant::Unlock {
                entitlement: "maps".to_owned()
            })
        );
        assert!(catalog.contains(&ProductId::from("com.app.tip")));
        assert!(catalog.grant_for(&ProductId::from("com.app.tip")).is_none());
    }

    #[tokio::test]
    async fn test_invalid_catalogs_are_rejected() {
        for json in [
            r#"["com.app.a", "com.app.a"]"#,
            r#"["com.app.a", " com.app.a "]"#,
            r#"["  "]"#,
            r#"{"products": [{"id": "a", "grant": {"consumable": {"entitlement": "lives", "quantity": 0}}}]}"#,
            r#"{"products": [{"id": "a", "grant": {"unlock": {"entitlement": ""}}}]}"#,
            r#"{"items": []}"#,
        ] {
            assert!(
                matches!(load(json).await, Err(IapError::InvalidProductCatalog { .. })),
                "accepted {json}"
            );
        }
    }
}
