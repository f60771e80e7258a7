//! Records persisted by the marketplace stores.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, RequestId, RequestStatus, UserId};
use serde::{Deserialize, Serialize};

/// Kind of listing a product represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Crop,
    Livestock,
    Service,
    Device,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Crop => "crop",
            ProductType::Livestock => "livestock",
            ProductType::Service => "service",
            ProductType::Device => "device",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crop" => Ok(ProductType::Crop),
            "livestock" => Ok(ProductType::Livestock),
            "service" => Ok(ProductType::Service),
            "device" => Ok(ProductType::Device),
            other => Err(format!("unknown product type: {other}")),
        }
    }
}

/// A farmer's listing with its current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub farmer_id: UserId,
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub product_type: ProductType,
    /// Unit price.
    pub price: Money,
    /// Units in stock.
    pub quantity: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product listed now.
    pub fn new(
        id: impl Into<ProductId>,
        farmer_id: UserId,
        name: impl Into<String>,
        category: impl Into<String>,
        product_type: ProductType,
        price: Money,
        quantity: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            farmer_id,
            name: name.into(),
            category: category.into(),
            subcategory: None,
            description: None,
            image_url: None,
            product_type,
            price,
            quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }
}

/// Role of a marketplace user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Customer,
    Farmer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Customer => "customer",
            UserType::Farmer => "farmer",
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(UserType::Customer),
            "farmer" => Ok(UserType::Farmer),
            other => Err(format!("unknown user type: {other}")),
        }
    }
}

/// Identity profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub full_name: Option<String>,
    pub email: String,
    pub user_type: UserType,
    pub address: Option<String>,
}

impl Profile {
    pub fn new(user_id: UserId, email: impl Into<String>, user_type: UserType) -> Self {
        Self {
            user_id,
            full_name: None,
            email: email.into(),
            user_type,
            address: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Name to show for this user, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// One product line of a purchase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price captured when the request was created.
    pub unit_price: Money,
}

impl LineItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A customer's request to buy products from one farmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: RequestId,
    pub customer_id: UserId,
    pub farmer_id: UserId,
    pub items: Vec<LineItem>,
    /// Snapshot of the line totals at creation; never recomputed.
    pub total_amount: Money,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseRequest {
    /// Returns the total number of units across all lines, saturating at
    /// `u32::MAX`.
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Returns true if the user is the customer or the farmer of this request.
    pub fn involves(&self, user_id: UserId) -> bool {
        self.customer_id == user_id || self.farmer_id == user_id
    }
}

/// A stock decrement applied on behalf of one request line.
///
/// Movements are keyed by `(request_id, product_id)`; a store applies each key
/// at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub request_id: RequestId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockMovement {
    pub fn new(request_id: RequestId, product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            request_id,
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Stock remaining after a movement was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub remaining: u32,
    /// True if the product is no longer listed (stock exhausted).
    pub deactivated: bool,
    /// False if the movement was already recorded and this call changed
    /// nothing.
    pub applied: bool,
}
