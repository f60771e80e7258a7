//! Per-user carts held by the server.

use std::collections::HashMap;
use std::sync::Arc;

use common::UserId;
use domain::Cart;
use tokio::sync::{Mutex, RwLock};

/// Carts keyed by customer.
///
/// Each cart sits behind its own lock, so a checkout holds only that
/// customer's cart while the request is stored. Only non-empty carts are
/// kept: handlers hand their cart back through [`CartSessions::release`],
/// which drops it once it is empty and unused.
#[derive(Default)]
pub struct CartSessions {
    carts: RwLock<HashMap<UserId, Arc<Mutex<Cart>>>>,
}

impl CartSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's cart, creating an empty one on first use.
    ///
    /// Pair every call with [`CartSessions::release`].
    pub async fn cart(&self, user_id: UserId) -> Arc<Mutex<Cart>> {
        if let Some(cart) = self.carts.read().await.get(&user_id) {
            return cart.clone();
        }
        self.carts.write().await.entry(user_id).or_default().clone()
    }

    /// Returns the user's cart if they have one, without creating it. Hand it
    /// back through [`CartSessions::release`] as well.
    pub async fn peek(&self, user_id: UserId) -> Option<Arc<Mutex<Cart>>> {
        self.carts.read().await.get(&user_id).cloned()
    }

    /// Hands back a cart obtained from [`CartSessions::cart`].
    ///
    /// The entry is removed if the cart is empty and no other handler holds
    /// it. Handles are only given out under the map lock, so with the write
    /// lock held a count of two (map and `cart`) means nobody else can reach
    /// the cart.
    pub async fn release(&self, user_id: UserId, cart: Arc<Mutex<Cart>>) {
        let mut carts = self.carts.write().await;
        let Some(stored) = carts.get(&user_id) else {
            return;
        };
        if !Arc::ptr_eq(stored, &cart) || Arc::strong_count(&cart) > 2 {
            return;
        }
        let empty = match cart.try_lock() {
            Ok(guard) => guard.is_empty(),
            Err(_) => false,
        };
        if empty {
            carts.remove(&user_id);
            tracing::debug!(%user_id, "empty cart dropped");
        }
    }

    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.carts.read().await.is_empty()
    }
}
