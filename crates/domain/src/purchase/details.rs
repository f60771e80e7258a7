//! Read view of a purchase request joined with profiles and products.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use storage::{LineItem, Product, Profile, PurchaseRequest};

/// One request line with the product it refers to.
///
/// `product` is `None` if the listing no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLine {
    pub item: LineItem,
    pub product: Option<Product>,
}

impl DetailLine {
    /// Product name for display, falling back to the product id.
    pub fn product_name(&self) -> String {
        match &self.product {
            Some(product) => product.name.clone(),
            None => self.item.product_id.to_string(),
        }
    }

    pub fn line_total(&self) -> Money {
        self.item.line_total()
    }
}

/// A purchase request as shown to either party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestDetails {
    pub request: PurchaseRequest,
    pub customer: Option<Profile>,
    pub farmer: Option<Profile>,
    pub lines: Vec<DetailLine>,
}

impl PurchaseRequestDetails {
    /// Returns the product of a line, if it still exists.
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.lines
            .iter()
            .find(|line| &line.item.product_id == id)
            .and_then(|line| line.product.as_ref())
    }

    /// Returns the total number of units requested.
    pub fn item_count(&self) -> u32 {
        self.request.total_quantity()
    }
}
