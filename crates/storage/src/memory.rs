use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{ProductId, RequestId, RequestStatus, UserId};
use tokio::sync::RwLock;

use crate::{
    Page, Product, Profile, PurchaseRequest, Result, StockLevel, StockMovement, StorageError,
    store::{ProductStore, ProfileDirectory, PurchaseRequestRepository},
};

/// In-memory profile directory.
#[derive(Clone, Default)]
pub struct InMemoryProfileDirectory {
    profiles: Arc<RwLock<HashMap<UserId, Profile>>>,
}

impl InMemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with the given profiles.
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let map = profiles.into_iter().map(|p| (p.user_id, p)).collect();
        Self {
            profiles: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryProfileDirectory {
    async fn get(&self, user_id: UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, profile: Profile) -> Result<()> {
        self.profiles.write().await.insert(profile.user_id, profile);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct AppliedMovement {
    quantity: u32,
    deactivated: bool,
}

#[derive(Default)]
struct ProductState {
    /// Products with their insertion sequence, used to break `created_at` ties.
    products: HashMap<ProductId, (u64, Product)>,
    movements: HashMap<(RequestId, ProductId), AppliedMovement>,
    next_seq: u64,
    failing: HashSet<ProductId>,
}

/// In-memory product store.
///
/// All stock changes happen under one write lock, which serializes sales per
/// product (and across products).
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    state: Arc<RwLock<ProductState>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `apply_sale` for this product fail with
    /// `Unavailable`, simulating a dropped connection.
    pub async fn fail_sales_for(&self, product_id: impl Into<ProductId>) {
        self.state.write().await.failing.insert(product_id.into());
    }

    /// Clears all injected failures.
    pub async fn clear_failures(&self) {
        self.state.write().await.failing.clear();
    }

    /// Returns the number of movements currently applied.
    pub async fn movement_count(&self) -> usize {
        self.state.read().await.movements.len()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self
            .state
            .read()
            .await
            .products
            .get(id)
            .map(|(_, p)| p.clone()))
    }

    async fn insert(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        if state.products.contains_key(&product.id) {
            return Err(StorageError::Duplicate {
                entity: "Product",
                id: product.id.to_string(),
            });
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        state.products.insert(product.id.clone(), (seq, product));
        Ok(())
    }

    async fn update_quantity(&self, id: &ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let (_, product) = state
            .products
            .get_mut(id)
            .ok_or_else(|| StorageError::product_not_found(id))?;
        product.quantity = quantity;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn deactivate(&self, id: &ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        let (_, product) = state
            .products
            .get_mut(id)
            .ok_or_else(|| StorageError::product_not_found(id))?;
        product.is_active = false;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state
            .products
            .values()
            .filter(|(_, p)| p.is_active)
            .collect();
        products.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        Ok(products.into_iter().map(|(_, p)| p.clone()).collect())
    }

    async fn apply_sale(&self, movement: &StockMovement) -> Result<StockLevel> {
        let mut state = self.state.write().await;
        let key = (movement.request_id, movement.product_id.clone());

        if state.movements.contains_key(&key) {
            let (_, product) = state
                .products
                .get(&movement.product_id)
                .ok_or_else(|| StorageError::product_not_found(&movement.product_id))?;
            return Ok(StockLevel {
                product_id: product.id.clone(),
                remaining: product.quantity,
                deactivated: !product.is_active,
                applied: false,
            });
        }

        if state.failing.contains(&movement.product_id) {
            return Err(StorageError::Unavailable(format!(
                "sale of product {} could not be recorded",
                movement.product_id
            )));
        }

        let (_, product) = state
            .products
            .get_mut(&movement.product_id)
            .ok_or_else(|| StorageError::product_not_found(&movement.product_id))?;

        if !product.is_active {
            return Err(StorageError::ProductInactive(product.id.clone()));
        }
        if product.quantity < movement.quantity {
            return Err(StorageError::InsufficientStock {
                product_id: product.id.clone(),
                available: product.quantity,
                requested: movement.quantity,
            });
        }

        product.quantity -= movement.quantity;
        let deactivated = product.quantity == 0;
        if deactivated {
            product.is_active = false;
        }
        product.updated_at = Utc::now();

        let level = StockLevel {
            product_id: product.id.clone(),
            remaining: product.quantity,
            deactivated,
            applied: true,
        };
        state.movements.insert(
            key,
            AppliedMovement {
                quantity: movement.quantity,
                deactivated,
            },
        );
        metrics::counter!("stock_movements_applied_total").increment(1);
        Ok(level)
    }

    async fn revert_sale(&self, movement: &StockMovement) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (movement.request_id, movement.product_id.clone());

        let Some(applied) = state.movements.remove(&key) else {
            return Ok(());
        };

        let (_, product) = state
            .products
            .get_mut(&movement.product_id)
            .ok_or_else(|| StorageError::product_not_found(&movement.product_id))?;
        product.quantity += applied.quantity;
        if applied.deactivated {
            product.is_active = true;
        }
        product.updated_at = Utc::now();
        metrics::counter!("stock_movements_reverted_total").increment(1);
        Ok(())
    }
}

#[derive(Default)]
struct RequestState {
    requests: HashMap<RequestId, (u64, PurchaseRequest)>,
    next_seq: u64,
}

impl RequestState {
    fn newest_first(
        &self,
        page: Page,
        filter: impl Fn(&PurchaseRequest) -> bool,
    ) -> Vec<PurchaseRequest> {
        let mut matching: Vec<_> = self
            .requests
            .values()
            .filter(|(_, r)| filter(r))
            .collect();
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        page.apply(matching.into_iter().map(|(_, r)| r.clone()).collect())
    }
}

/// In-memory purchase request repository.
#[derive(Clone, Default)]
pub struct InMemoryPurchaseRequestRepository {
    state: Arc<RwLock<RequestState>>,
}

impl InMemoryPurchaseRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored requests.
    pub async fn request_count(&self) -> usize {
        self.state.read().await.requests.len()
    }
}

#[async_trait]
impl PurchaseRequestRepository for InMemoryPurchaseRequestRepository {
    async fn insert(&self, request: PurchaseRequest) -> Result<()> {
        let mut state = self.state.write().await;
        if state.requests.contains_key(&request.id) {
            return Err(StorageError::Duplicate {
                entity: "PurchaseRequest",
                id: request.id.to_string(),
            });
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        state.requests.insert(request.id, (seq, request));
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<PurchaseRequest>> {
        Ok(self
            .state
            .read()
            .await
            .requests
            .get(&id)
            .map(|(_, r)| r.clone()))
    }

    async fn update_status(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<PurchaseRequest> {
        let mut state = self.state.write().await;
        let (_, request) = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| StorageError::request_not_found(id))?;
        if request.status != from {
            return Err(StorageError::StatusConflict {
                id,
                actual: request.status,
            });
        }
        request.status = to;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn delete(&self, id: RequestId, allowed: &[RequestStatus]) -> Result<()> {
        let mut state = self.state.write().await;
        let (_, request) = state
            .requests
            .get(&id)
            .ok_or_else(|| StorageError::request_not_found(id))?;
        if !allowed.contains(&request.status) {
            return Err(StorageError::StatusConflict {
                id,
                actual: request.status,
            });
        }
        state.requests.remove(&id);
        Ok(())
    }

    async fn query_by_customer(
        &self,
        customer_id: UserId,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>> {
        let state = self.state.read().await;
        Ok(state.newest_first(page, |r| r.customer_id == customer_id))
    }

    async fn query_by_farmer(&self, farmer_id: UserId, page: Page) -> Result<Vec<PurchaseRequest>> {
        let state = self.state.read().await;
        Ok(state.newest_first(page, |r| r.farmer_id == farmer_id))
    }
}
