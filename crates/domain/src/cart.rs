//! Shopping cart.
//!
//! A [`Cart`] is a plain value owned by whoever holds the customer's session.
//! It performs no I/O: stock is only checked when a request is paid.

use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};
use storage::{LineItem, Product};

use crate::error::{DomainError, Result};

/// A product selected into a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    /// Price per unit at the time the item was added.
    pub unit_price: Money,
    pub image: Option<String>,
    pub farmer_id: UserId,
    pub quantity: u32,
}

impl CartItem {
    /// Creates an item snapshot. The quantity is set when it is added to a cart.
    pub fn new(
        id: impl Into<ProductId>,
        farmer_id: UserId,
        name: impl Into<String>,
        category: impl Into<String>,
        unit_price: Money,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            description: None,
            unit_price,
            image: None,
            farmer_id,
            quantity: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

impl From<&Product> for CartItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            description: product.description.clone(),
            unit_price: product.price,
            image: product.image_url.clone(),
            farmer_id: product.farmer_id,
            quantity: 0,
        }
    }
}

/// Payload produced by [`Cart::checkout`] and consumed by
/// [`PurchaseRequestService::create`](crate::PurchaseRequestService::create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseRequest {
    pub customer_id: UserId,
    pub farmer_id: UserId,
    pub items: Vec<LineItem>,
    pub message: Option<String>,
}

impl NewPurchaseRequest {
    /// Returns the sum of the line totals, or `AmountOverflow` if it does not
    /// fit in the minor-unit range.
    pub fn total_amount(&self) -> Result<Money> {
        checked_total(&self.items)
    }
}

/// Sums line totals without wrapping or clamping.
pub(crate) fn checked_total(items: &[LineItem]) -> Result<Money> {
    items
        .iter()
        .map(|item| item.unit_price.checked_multiply(item.quantity))
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line?))
        .ok_or(DomainError::AmountOverflow {
            context: "purchase request total",
        })
}

/// Items a customer intends to buy from a single farmer.
///
/// Items keep their insertion order. The farmer of the first item binds the
/// cart until it is emptied. Mutations that would push the unit count past
/// `u32::MAX` or the price total past the minor-unit range are refused, so the
/// totals are always exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` units of an item.
    ///
    /// An item already in the cart has its quantity incremented; its stored
    /// snapshot is kept. Fails with `InvalidQuantity` for zero, with
    /// `MixedFarmer` when the item belongs to another farmer than the cart and
    /// with `AmountOverflow` when the totals would leave their range.
    pub fn add_item(&mut self, item: CartItem, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }
        if let Some(expected) = self.farmer_id()
            && expected != item.farmer_id
        {
            return Err(DomainError::MixedFarmer {
                expected,
                found: item.farmer_id,
            });
        }

        match self.items.iter().position(|existing| existing.id == item.id) {
            Some(index) => {
                let merged = self.items[index]
                    .quantity
                    .checked_add(quantity)
                    .ok_or(DomainError::AmountOverflow {
                        context: "cart quantity",
                    })?;
                self.ensure_totals_fit(Some(index), merged, self.items[index].unit_price)?;
                self.items[index].quantity = merged;
            }
            None => {
                self.ensure_totals_fit(None, quantity, item.unit_price)?;
                self.items.push(CartItem { quantity, ..item });
            }
        }
        Ok(())
    }

    /// Sets the quantity of an item; zero or less removes it.
    ///
    /// Returns `false` if the item is not in the cart. A quantity that would
    /// push the totals out of range fails with `AmountOverflow` and leaves the
    /// cart unchanged.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: i64) -> Result<bool> {
        let Some(index) = self.items.iter().position(|item| &item.id == id) else {
            return Ok(false);
        };
        if quantity <= 0 {
            self.items.remove(index);
            return Ok(true);
        }
        let quantity = u32::try_from(quantity).map_err(|_| DomainError::AmountOverflow {
            context: "cart quantity",
        })?;
        self.ensure_totals_fit(Some(index), quantity, self.items[index].unit_price)?;
        self.items[index].quantity = quantity;
        Ok(true)
    }

    /// Checks the totals the cart would have with the line at `index` (or a
    /// new line when `None`) set to `quantity` units at `unit_price`.
    fn ensure_totals_fit(
        &self,
        index: Option<usize>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<()> {
        let others = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != index)
            .map(|(_, item)| item);

        let mut count = quantity;
        let mut total = unit_price.checked_multiply(quantity);
        for item in others {
            count = count
                .checked_add(item.quantity)
                .ok_or(DomainError::AmountOverflow {
                    context: "cart quantity",
                })?;
            total = total.and_then(|t| {
                item.unit_price
                    .checked_multiply(item.quantity)
                    .and_then(|line| t.checked_add(line))
            });
        }
        total.map(|_| ()).ok_or(DomainError::AmountOverflow {
            context: "cart total",
        })
    }

    /// Removes an item. Returns `false` if it was not in the cart.
    pub fn remove_item(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    /// Empties the cart and releases its farmer binding.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the farmer every item belongs to, if the cart is not empty.
    pub fn farmer_id(&self) -> Option<UserId> {
        self.items.first().map(|item| item.farmer_id)
    }

    /// Returns the total number of units across all items.
    pub fn total_item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Returns the sum of `unit_price * quantity` over all items.
    ///
    /// Exact as long as items only enter through [`Cart::add_item`] and
    /// [`Cart::update_quantity`]; otherwise saturates.
    pub fn total_price(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Builds the request payload for this cart.
    ///
    /// The cart itself is left untouched; callers clear it once the request
    /// has been stored. A blank message is dropped.
    pub fn checkout(
        &self,
        customer_id: UserId,
        message: Option<String>,
    ) -> Result<NewPurchaseRequest> {
        let farmer_id = self.farmer_id().ok_or(DomainError::EmptyCart)?;
        let items = self
            .items
            .iter()
            .map(|item| LineItem::new(item.id.clone(), item.quantity, item.unit_price))
            .collect();
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(NewPurchaseRequest {
            customer_id,
            farmer_id,
            items,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, farmer_id: UserId, price: i64) -> CartItem {
        CartItem::new(id, farmer_id, format!("Item {id}"), "Grains", Money::from_minor(price))
    }

    fn assert_totals_consistent(cart: &Cart) {
        let expected_price: i64 = cart
            .items()
            .iter()
            .map(|i| i.unit_price.minor() * i64::from(i.quantity))
            .sum();
        let expected_count: u32 = cart.items().iter().map(|i| i.quantity).sum();
        assert_eq!(cart.total_price().minor(), expected_price);
        assert_eq!(cart.total_item_count(), expected_count);
    }

    #[test]
    fn test_add_new_and_existing_items() {
        let farmer = UserId::new();
        let mut cart = Cart::new();

        cart.add_item(item("P1", farmer, 1000), 2).unwrap();
        cart.add_item(item("P2", farmer, 500), 1).unwrap();
        cart.add_item(item("P1", farmer, 1000), 3).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.get(&ProductId::new("P1")).unwrap().quantity, 5);
        assert_eq!(cart.items()[0].id.as_str(), "P1");
        assert_eq!(cart.items()[1].id.as_str(), "P2");
        assert_totals_consistent(&cart);
    }

    #[test]
    fn test_add_zero_quantity_fails() {
        let mut cart = Cart::new();
        let result = cart.add_item(item("P1", UserId::new(), 1000), 0);
        assert!(matches!(result, Err(DomainError::InvalidQuantity { quantity: 0 })));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_from_second_farmer_fails_without_change() {
        let farmer_a = UserId::new();
        let farmer_b = UserId::new();
        let mut cart = Cart::new();
        cart.add_item(item("P1", farmer_a, 1000), 1).unwrap();

        let result = cart.add_item(item("P9", farmer_b, 200), 1);

        assert!(matches!(
            result,
            Err(DomainError::MixedFarmer { expected, found }) if expected == farmer_a && found == farmer_b
        ));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.farmer_id(), Some(farmer_a));
    }

    #[test]
    fn test_update_quantity() {
        let farmer = UserId::new();
        let mut cart = Cart::new();
        cart.add_item(item("P1", farmer, 1000), 2).unwrap();
        cart.add_item(item("P2", farmer, 500), 1).unwrap();

        assert!(cart.update_quantity(&ProductId::new("P1"), 7).unwrap());
        assert_eq!(cart.get(&ProductId::new("P1")).unwrap().quantity, 7);
        assert_totals_consistent(&cart);

        assert!(cart.update_quantity(&ProductId::new("P2"), 0).unwrap());
        assert!(cart.get(&ProductId::new("P2")).is_none());

        assert!(cart.update_quantity(&ProductId::new("P1"), -3).unwrap());
        assert!(cart.is_empty());

        assert!(!cart.update_quantity(&ProductId::new("NOPE"), 4).unwrap());
    }

    #[test]
    fn test_add_refuses_total_out_of_range() {
        let farmer = UserId::new();
        let mut cart = Cart::new();
        let tractor = CartItem::new(
            "P1",
            farmer,
            "Tractor",
            "Devices",
            Money::from_minor(10_000_000_000),
        );

        let result = cart.add_item(tractor.clone(), 1_000_000_000);

        assert!(matches!(
            result,
            Err(DomainError::AmountOverflow { context: "cart total" })
        ));
        assert!(cart.is_empty());
        assert!(cart.total_price().is_zero());

        cart.add_item(tractor.clone(), 900_000_000).unwrap();
        assert!(matches!(
            cart.add_item(tractor, 100_000_000),
            Err(DomainError::AmountOverflow { .. })
        ));
        assert_eq!(cart.get(&ProductId::new("P1")).unwrap().quantity, 900_000_000);
        assert_totals_consistent(&cart);
    }

    #[test]
    fn test_total_counts_out_of_range_are_refused() {
        let farmer = UserId::new();
        let mut cart = Cart::new();
        cart.add_item(item("P1", farmer, 1), u32::MAX).unwrap();

        assert!(matches!(
            cart.add_item(item("P1", farmer, 1), 1),
            Err(DomainError::AmountOverflow { context: "cart quantity" })
        ));
        assert!(matches!(
            cart.add_item(item("P2", farmer, 1), 1),
            Err(DomainError::AmountOverflow { context: "cart quantity" })
        ));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_item_count(), u32::MAX);
    }

    #[test]
    fn test_update_refuses_total_out_of_range() {
        let farmer = UserId::new();
        let mut cart = Cart::new();
        cart.add_item(item("P1", farmer, 10_000_000_000), 2).unwrap();
        cart.add_item(item("P2", farmer, 500), 1).unwrap();

        let result = cart.update_quantity(&ProductId::new("P1"), 1_000_000_000);
        assert!(matches!(result, Err(DomainError::AmountOverflow { .. })));

        let result = cart.update_quantity(&ProductId::new("P2"), i64::MAX);
        assert!(matches!(result, Err(DomainError::AmountOverflow { .. })));

        assert_eq!(cart.get(&ProductId::new("P1")).unwrap().quantity, 2);
        assert_eq!(cart.get(&ProductId::new("P2")).unwrap().quantity, 1);
        assert_eq!(cart.total_price().minor(), 20_000_000_500);
    }

    #[test]
    fn test_request_total_out_of_range() {
        let new_request = NewPurchaseRequest {
            customer_id: UserId::new(),
            farmer_id: UserId::new(),
            items: vec![
                LineItem::new("P1", u32::MAX, Money::from_minor(i64::MAX / 2)),
                LineItem::new("P2", 1, Money::from_minor(100)),
            ],
            message: None,
        };
        assert!(matches!(
            new_request.total_amount(),
            Err(DomainError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_remove_item_is_idempotent() {
        let farmer = UserId::new();
        let mut cart = Cart::new();
        cart.add_item(item("P1", farmer, 1000), 2).unwrap();

        assert!(cart.remove_item(&ProductId::new("P1")));
        assert!(!cart.remove_item(&ProductId::new("P1")));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear_twice_and_farmer_released() {
        let mut cart = Cart::new();
        cart.add_item(item("P1", UserId::new(), 1000), 2).unwrap();

        cart.clear();
        cart.clear();

        assert_eq!(cart.total_item_count(), 0);
        assert!(cart.total_price().is_zero());
        assert_eq!(cart.farmer_id(), None);

        // A different farmer can be used once the cart is empty.
        cart.add_item(item("P5", UserId::new(), 300), 1).unwrap();
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_totals_hold_over_mixed_operations() {
        let farmer = UserId::new();
        let mut cart = Cart::new();
        let steps: [(&str, i64); 8] = [
            ("P1", 3),
            ("P2", 1),
            ("P3", 4),
            ("P1", -1),
            ("P2", 9),
            ("P3", 0),
            ("P4", 2),
            ("P2", 2),
        ];

        for (i, (id, qty)) in steps.into_iter().enumerate() {
            let product = ProductId::new(id);
            if i % 3 == 2 && cart.get(&product).is_some() {
                cart.update_quantity(&product, qty).unwrap();
            } else if qty > 0 {
                cart.add_item(item(id, farmer, 250 * (i as i64 + 1)), qty as u32)
                    .unwrap();
            } else {
                cart.remove_item(&product);
            }
            assert_totals_consistent(&cart);
        }
    }

    #[test]
    fn test_checkout_builds_line_items() {
        let farmer = UserId::new();
        let customer = UserId::new();
        let mut cart = Cart::new();
        cart.add_item(item("P1", farmer, 1000), 2).unwrap();
        cart.add_item(item("P2", farmer, 500), 1).unwrap();

        let new_request = cart
            .checkout(customer, Some("  Please deliver to Jos  ".to_string()))
            .unwrap();

        assert_eq!(new_request.farmer_id, farmer);
        assert_eq!(new_request.customer_id, customer);
        assert_eq!(
            new_request.items,
            vec![
                LineItem::new("P1", 2, Money::from_minor(1000)),
                LineItem::new("P2", 1, Money::from_minor(500)),
            ]
        );
        assert_eq!(new_request.total_amount().unwrap().minor(), 2500);
        assert_eq!(new_request.message.as_deref(), Some("Please deliver to Jos"));
        assert_eq!(cart.total_item_count(), 3);
    }

    #[test]
    fn test_checkout_empty_cart_fails() {
        let cart = Cart::new();
        assert!(matches!(
            cart.checkout(UserId::new(), None),
            Err(DomainError::EmptyCart)
        ));
    }

    #[test]
    fn test_blank_message_is_dropped() {
        let mut cart = Cart::new();
        cart.add_item(item("P1", UserId::new(), 1000), 1).unwrap();
        let new_request = cart.checkout(UserId::new(), Some("   ".to_string())).unwrap();
        assert_eq!(new_request.message, None);
    }

    #[test]
    fn test_cart_serializes_items_in_order() {
        let farmer = UserId::new();
        let mut cart = Cart::new();
        cart.add_item(item("P2", farmer, 500), 1).unwrap();
        cart.add_item(item("P1", farmer, 1000), 2).unwrap();

        let json = serde_json::to_value(&cart).unwrap();

        assert_eq!(json["items"][0]["id"], "P2");
        assert_eq!(json["items"][1]["unit_price"], 1000);
        assert_eq!(json["items"][1]["quantity"], 2);
        let restored: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(restored, cart);
    }

    #[test]
    fn test_item_from_product() {
        let product = Product::new(
            "GOAT-1",
            UserId::new(),
            "Red Sokoto goat",
            "Goats",
            storage::ProductType::Livestock,
            Money::from_minor(4_500_000),
            3,
        )
        .with_image_url("https://img.example/goat.png");

        let cart_item = CartItem::from(&product);

        assert_eq!(cart_item.id, product.id);
        assert_eq!(cart_item.unit_price, product.price);
        assert_eq!(cart_item.farmer_id, product.farmer_id);
        assert_eq!(cart_item.image.as_deref(), Some("https://img.example/goat.png"));
        assert_eq!(cart_item.quantity, 0);
    }
}
