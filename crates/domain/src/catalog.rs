//! Catalog browsing over active products.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use storage::{Product, ProductStore, ProductType};

use crate::error::{DomainError, Result};

/// Criteria for narrowing the product listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub product_type: Option<ProductType>,
    /// Case-insensitive match on category or subcategory.
    pub category: Option<String>,
    pub farmer_id: Option<UserId>,
    /// Case-insensitive substring of the name or description.
    pub search: Option<String>,
}

impl CatalogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, product_type: ProductType) -> Self {
        self.product_type = Some(product_type);
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn from_farmer(mut self, farmer_id: UserId) -> Self {
        self.farmer_id = Some(farmer_id);
        self
    }

    pub fn matching(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Returns true if the product satisfies every set criterion.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(product_type) = self.product_type
            && product.product_type != product_type
        {
            return false;
        }
        if let Some(farmer_id) = self.farmer_id
            && product.farmer_id != farmer_id
        {
            return false;
        }
        if let Some(category) = self.category.as_deref().map(str::trim)
            && !category.is_empty()
        {
            let in_category = product.category.eq_ignore_ascii_case(category)
                || product
                    .subcategory
                    .as_deref()
                    .is_some_and(|sub| sub.eq_ignore_ascii_case(category));
            if !in_category {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            let needle = search.to_lowercase();
            let found = product.name.to_lowercase().contains(&needle)
                || product
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

/// Returns active products matching the filter, newest first.
#[tracing::instrument(skip(store))]
pub async fn browse<P: ProductStore>(store: &P, filter: &CatalogFilter) -> Result<Vec<Product>> {
    let products = store.list_active().await?;
    Ok(products
        .into_iter()
        .filter(|product| filter.matches(product))
        .collect())
}

/// Removes a product from the catalog. Only its farmer may withdraw it.
///
/// The product is deactivated rather than deleted so existing requests keep
/// their references.
#[tracing::instrument(skip(store))]
pub async fn withdraw<P: ProductStore>(store: &P, caller: UserId, id: &ProductId) -> Result<()> {
    let product = store
        .get(id)
        .await?
        .ok_or_else(|| DomainError::product_not_found(id))?;
    if product.farmer_id != caller {
        return Err(DomainError::Unauthorized {
            user_id: caller,
            action: "withdraw",
        });
    }
    store.deactivate(id).await?;
    tracing::info!(product_id = %id, "product withdrawn");
    Ok(())
}
