use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, RequestId, RequestStatus, UserId};

use crate::{
    Page, Product, Profile, PurchaseRequest, Result, StockLevel, StockMovement,
};

/// Identity collaborator used for authorization and display.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Returns the profile of a user, if one exists.
    async fn get(&self, user_id: UserId) -> Result<Option<Profile>>;

    /// Inserts or replaces a profile.
    async fn upsert(&self, profile: Profile) -> Result<()>;
}

/// Inventory collaborator.
///
/// `apply_sale` is the only path that decrements stock. It must be serialized
/// per product so concurrent sales can never drive stock below zero.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Returns a product by ID, active or not.
    async fn get(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Lists a new product. Fails with `Duplicate` if the ID is taken.
    async fn insert(&self, product: Product) -> Result<()>;

    /// Sets the stock of a product.
    async fn update_quantity(&self, id: &ProductId, quantity: u32) -> Result<()>;

    /// Removes a product from the catalog without deleting it.
    async fn deactivate(&self, id: &ProductId) -> Result<()>;

    /// Returns all active products, newest first.
    async fn list_active(&self) -> Result<Vec<Product>>;

    /// Decrements stock for one request line.
    ///
    /// Fails with `NotFound`, `ProductInactive` or `InsufficientStock` without
    /// changing anything. A product whose stock reaches zero is deactivated.
    /// Applying a movement that was already applied is a no-op that reports the
    /// current level.
    async fn apply_sale(&self, movement: &StockMovement) -> Result<StockLevel>;

    /// Undoes a previously applied movement, restoring the stock and
    /// reactivating the product if the sale deactivated it. Reverting a
    /// movement that was never applied is a no-op.
    async fn revert_sale(&self, movement: &StockMovement) -> Result<()>;
}

/// Persistence of purchase requests.
#[async_trait]
pub trait PurchaseRequestRepository: Send + Sync {
    /// Stores a new request. Fails with `Duplicate` if the ID is taken.
    async fn insert(&self, request: PurchaseRequest) -> Result<()>;

    /// Returns a request by ID.
    async fn get(&self, id: RequestId) -> Result<Option<PurchaseRequest>>;

    /// Moves a request from `from` to `to`, touching `updated_at`.
    ///
    /// Fails with `StatusConflict` if the stored status is not `from`.
    async fn update_status(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<PurchaseRequest>;

    /// Hard-deletes a request whose status is one of `allowed`.
    ///
    /// Fails with `StatusConflict` if the stored status is not allowed.
    async fn delete(&self, id: RequestId, allowed: &[RequestStatus]) -> Result<()>;

    /// Requests placed by a customer, newest first.
    async fn query_by_customer(&self, customer_id: UserId, page: Page)
    -> Result<Vec<PurchaseRequest>>;

    /// Requests addressed to a farmer, newest first.
    async fn query_by_farmer(&self, farmer_id: UserId, page: Page) -> Result<Vec<PurchaseRequest>>;
}

#[async_trait]
impl<T: ProfileDirectory + ?Sized> ProfileDirectory for Arc<T> {
    async fn get(&self, user_id: UserId) -> Result<Option<Profile>> {
        (**self).get(user_id).await
    }

    async fn upsert(&self, profile: Profile) -> Result<()> {
        (**self).upsert(profile).await
    }
}

#[async_trait]
impl<T: ProductStore + ?Sized> ProductStore for Arc<T> {
    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        (**self).get(id).await
    }

    async fn insert(&self, product: Product) -> Result<()> {
        (**self).insert(product).await
    }

    async fn update_quantity(&self, id: &ProductId, quantity: u32) -> Result<()> {
        (**self).update_quantity(id, quantity).await
    }

    async fn deactivate(&self, id: &ProductId) -> Result<()> {
        (**self).deactivate(id).await
    }

    async fn list_active(&self) -> Result<Vec<Product>> {
        (**self).list_active().await
    }

    async fn apply_sale(&self, movement: &StockMovement) -> Result<StockLevel> {
        (**self).apply_sale(movement).await
    }

    async fn revert_sale(&self, movement: &StockMovement) -> Result<()> {
        (**self).revert_sale(movement).await
    }
}

#[async_trait]
impl<T: PurchaseRequestRepository + ?Sized> PurchaseRequestRepository for Arc<T> {
    async fn insert(&self, request: PurchaseRequest) -> Result<()> {
        (**self).insert(request).await
    }

    async fn get(&self, id: RequestId) -> Result<Option<PurchaseRequest>> {
        (**self).get(id).await
    }

    async fn update_status(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<PurchaseRequest> {
        (**self).update_status(id, from, to).await
    }

    async fn delete(&self, id: RequestId, allowed: &[RequestStatus]) -> Result<()> {
        (**self).delete(id, allowed).await
    }

    async fn query_by_customer(
        &self,
        customer_id: UserId,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>> {
        (**self).query_by_customer(customer_id, page).await
    }

    async fn query_by_farmer(&self, farmer_id: UserId, page: Page) -> Result<Vec<PurchaseRequest>> {
        (**self).query_by_farmer(farmer_id, page).await
    }
}
