//! Purchase request service: creation, status transitions and payment.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{ProductId, RequestId, RequestStatus, UserId};
use futures_util::future::{try_join_all, try_join3};
use storage::{
    LineItem, Page, ProductStore, ProfileDirectory, PurchaseRequest, PurchaseRequestRepository,
    StorageError,
};

use super::details::{DetailLine, PurchaseRequestDetails};
use super::settlement::{InFlight, apply_sales};
use crate::cart::{NewPurchaseRequest, checked_total};
use crate::error::{DomainError, Result};
use crate::receipt::Receipt;
use crate::sales::FarmerSalesSummary;

const DELETABLE: [RequestStatus; 2] = [RequestStatus::Pending, RequestStatus::Rejected];

/// Service for managing purchase requests.
///
/// Every operation takes the calling user's id; the farmer decides on a
/// request, the customer pays for or deletes it.
#[derive(Clone)]
pub struct PurchaseRequestService<R, P, D>
where
    R: PurchaseRequestRepository,
    P: ProductStore,
    D: ProfileDirectory,
{
    requests: R,
    products: P,
    profiles: D,
    in_flight: InFlight,
}

impl<R, P, D> PurchaseRequestService<R, P, D>
where
    R: PurchaseRequestRepository,
    P: ProductStore,
    D: ProfileDirectory,
{
    /// Creates a new service over the given stores.
    pub fn new(requests: R, products: P, profiles: D) -> Self {
        Self {
            requests,
            products,
            profiles,
            in_flight: InFlight::default(),
        }
    }

    /// Returns the product store.
    pub fn products(&self) -> &P {
        &self.products
    }

    /// Returns the profile directory.
    pub fn profiles(&self) -> &D {
        &self.profiles
    }

    /// Stores a new pending request.
    ///
    /// The caller must be the request's customer. Lines naming the same
    /// product are merged. Every product must exist and belong to the
    /// request's farmer. A total that does not fit the minor-unit range
    /// fails with `AmountOverflow`.
    #[tracing::instrument(skip(self, new_request), fields(farmer_id = %new_request.farmer_id))]
    pub async fn create(
        &self,
        caller: UserId,
        new_request: NewPurchaseRequest,
    ) -> Result<PurchaseRequest> {
        if new_request.customer_id != caller {
            return Err(DomainError::Unauthorized {
                user_id: caller,
                action: "create",
            });
        }
        if new_request.items.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        if new_request.items.iter().any(|item| item.quantity == 0) {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }

        let items = merge_lines(new_request.items)?;
        let total_amount = checked_total(&items)?;
        for item in &items {
            let product = self
                .products
                .get(&item.product_id)
                .await?
                .ok_or_else(|| DomainError::product_not_found(&item.product_id))?;
            if product.farmer_id != new_request.farmer_id {
                return Err(DomainError::MixedFarmer {
                    expected: new_request.farmer_id,
                    found: product.farmer_id,
                });
            }
        }

        let now = Utc::now();
        let request = PurchaseRequest {
            id: RequestId::new(),
            customer_id: new_request.customer_id,
            farmer_id: new_request.farmer_id,
            total_amount,
            items,
            message: new_request.message,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.requests.insert(request.clone()).await?;

        metrics::counter!("purchase_requests_created_total").increment(1);
        tracing::info!(
            request_id = %request.id,
            total_amount = %request.total_amount,
            "purchase request created"
        );
        Ok(request)
    }

    /// Accepts a pending request. Only the farmer may accept.
    #[tracing::instrument(skip(self))]
    pub async fn accept(&self, caller: UserId, id: RequestId) -> Result<PurchaseRequest> {
        self.decide(caller, id, RequestStatus::Accepted, "accept")
            .await
    }

    /// Rejects a pending request. Only the farmer may reject.
    #[tracing::instrument(skip(self))]
    pub async fn reject(&self, caller: UserId, id: RequestId) -> Result<PurchaseRequest> {
        self.decide(caller, id, RequestStatus::Rejected, "reject")
            .await
    }

    async fn decide(
        &self,
        caller: UserId,
        id: RequestId,
        to: RequestStatus,
        action: &'static str,
    ) -> Result<PurchaseRequest> {
        let request = self.load(id).await?;
        if request.farmer_id != caller {
            return Err(DomainError::Unauthorized {
                user_id: caller,
                action,
            });
        }
        let allowed = match to {
            RequestStatus::Accepted => request.status.can_accept(),
            _ => request.status.can_reject(),
        };
        if !allowed {
            return Err(DomainError::InvalidStateTransition {
                current: request.status,
                action,
            });
        }

        let updated = self
            .requests
            .update_status(id, RequestStatus::Pending, to)
            .await
            .map_err(|e| DomainError::from_transition(e, action))?;

        metrics::counter!("purchase_request_transitions_total", "action" => action).increment(1);
        tracing::info!(request_id = %id, action, status = %updated.status, "purchase request decided");
        Ok(updated)
    }

    /// Pays for an accepted request and decrements the farmer's stock.
    ///
    /// Only the customer may pay. If any line cannot be decremented, the lines
    /// this attempt decremented are restored, the request stays accepted and
    /// `InventoryUpdate` is returned.
    ///
    /// Concurrent payments of one request are refused within this process.
    /// Across processes sharing a store, the store records at most one
    /// movement per request line and a failed attempt only reverts the
    /// movements it recorded itself, so a line settled by another payer, or
    /// by an earlier interrupted attempt, stays decremented until that
    /// request is paid.
    #[tracing::instrument(skip(self))]
    pub async fn pay(&self, caller: UserId, id: RequestId) -> Result<PurchaseRequest> {
        let start = Instant::now();
        let result = self.settle(caller, id).await;

        let outcome = match &result {
            Ok(_) => "paid",
            Err(DomainError::InventoryUpdate { .. }) => "inventory_failed",
            Err(_) => "rejected",
        };
        metrics::counter!("purchase_request_payments_total", "outcome" => outcome).increment(1);
        metrics::histogram!("payment_duration_seconds").record(start.elapsed().as_secs_f64());
        result
    }

    async fn settle(&self, caller: UserId, id: RequestId) -> Result<PurchaseRequest> {
        let request = self.load(id).await?;
        if request.customer_id != caller {
            return Err(DomainError::Unauthorized {
                user_id: caller,
                action: "pay",
            });
        }
        if !request.status.can_pay() {
            return Err(DomainError::InvalidStateTransition {
                current: request.status,
                action: "pay",
            });
        }

        let Some(_claim) = self.in_flight.claim(id) else {
            tracing::warn!(request_id = %id, "payment already in progress");
            return Err(DomainError::InvalidStateTransition {
                current: request.status,
                action: "pay",
            });
        };

        let applied = apply_sales(&self.products, &request).await?;

        match self
            .requests
            .update_status(id, RequestStatus::Accepted, RequestStatus::Paid)
            .await
        {
            Ok(paid) => {
                tracing::info!(request_id = %id, lines = applied.len(), "purchase request paid");
                Ok(paid)
            }
            // Another process settled this request; the movements are its own.
            Err(StorageError::StatusConflict {
                actual: RequestStatus::Paid,
                ..
            }) => Err(DomainError::InvalidStateTransition {
                current: RequestStatus::Paid,
                action: "pay",
            }),
            Err(e) => {
                tracing::warn!(
                    request_id = %id,
                    error = %e,
                    "status update failed after settlement"
                );
                applied.compensate(&self.products).await?;
                Err(DomainError::from_transition(e, "pay"))
            }
        }
    }

    /// Deletes a pending or rejected request. Only the customer may delete.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, caller: UserId, id: RequestId) -> Result<()> {
        let request = self.load(id).await?;
        if request.customer_id != caller {
            return Err(DomainError::Unauthorized {
                user_id: caller,
                action: "delete",
            });
        }
        if !request.status.can_delete() {
            return Err(DomainError::InvalidStateTransition {
                current: request.status,
                action: "delete",
            });
        }

        self.requests
            .delete(id, &DELETABLE)
            .await
            .map_err(|e| DomainError::from_transition(e, "delete"))?;

        metrics::counter!("purchase_request_transitions_total", "action" => "delete").increment(1);
        tracing::info!(request_id = %id, "purchase request deleted");
        Ok(())
    }

    /// Returns a request the caller is a party to.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, caller: UserId, id: RequestId) -> Result<PurchaseRequest> {
        let request = self.load(id).await?;
        if !request.involves(caller) {
            return Err(DomainError::Unauthorized {
                user_id: caller,
                action: "view",
            });
        }
        Ok(request)
    }

    /// Requests placed by a customer, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: UserId,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>> {
        Ok(self.requests.query_by_customer(customer_id, page).await?)
    }

    /// Requests addressed to a farmer, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_farmer(
        &self,
        farmer_id: UserId,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>> {
        Ok(self.requests.query_by_farmer(farmer_id, page).await?)
    }

    /// Returns a request with both parties' profiles and its products.
    #[tracing::instrument(skip(self))]
    pub async fn details(&self, caller: UserId, id: RequestId) -> Result<PurchaseRequestDetails> {
        let request = self.get(caller, id).await?;
        self.enrich(request).await
    }

    /// Attaches profiles and products to each request, fetching concurrently.
    pub async fn with_details(
        &self,
        requests: Vec<PurchaseRequest>,
    ) -> Result<Vec<PurchaseRequestDetails>> {
        try_join_all(requests.into_iter().map(|request| self.enrich(request))).await
    }

    async fn enrich(&self, request: PurchaseRequest) -> Result<PurchaseRequestDetails> {
        let products = try_join_all(
            request
                .items
                .iter()
                .map(|item| self.products.get(&item.product_id)),
        );
        let (customer, farmer, products) = try_join3(
            self.profiles.get(request.customer_id),
            self.profiles.get(request.farmer_id),
            products,
        )
        .await?;

        let lines = request
            .items
            .iter()
            .cloned()
            .zip(products)
            .map(|(item, product)| DetailLine { item, product })
            .collect();

        Ok(PurchaseRequestDetails {
            request,
            customer,
            farmer,
            lines,
        })
    }

    /// Returns the receipt of a paid request the caller is a party to.
    #[tracing::instrument(skip(self))]
    pub async fn receipt(&self, caller: UserId, id: RequestId) -> Result<Receipt> {
        let details = self.details(caller, id).await?;
        Receipt::for_request(&details)
    }

    /// Summarizes the requests addressed to a farmer. Only that farmer may
    /// view it.
    #[tracing::instrument(skip(self))]
    pub async fn sales_summary(
        &self,
        caller: UserId,
        farmer_id: UserId,
    ) -> Result<FarmerSalesSummary> {
        if caller != farmer_id {
            return Err(DomainError::Unauthorized {
                user_id: caller,
                action: "view sales",
            });
        }
        let requests = self.requests.query_by_farmer(farmer_id, Page::all()).await?;
        Ok(FarmerSalesSummary::from_requests(farmer_id, &requests))
    }

    async fn load(&self, id: RequestId) -> Result<PurchaseRequest> {
        self.requests
            .get(id)
            .await?
            .ok_or_else(|| DomainError::request_not_found(id))
    }
}

/// Merges lines naming the same product, keeping the first line's price and
/// position.
fn merge_lines(items: Vec<LineItem>) -> Result<Vec<LineItem>> {
    let mut positions: HashMap<ProductId, usize> = HashMap::new();
    let mut merged: Vec<LineItem> = Vec::with_capacity(items.len());
    for item in items {
        match positions.get(&item.product_id) {
            Some(&index) => {
                merged[index].quantity = merged[index]
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(DomainError::AmountOverflow {
                        context: "line quantity",
                    })?;
            }
            None => {
                positions.insert(item.product_id.clone(), merged.len());
                merged.push(item);
            }
        }
    }
    Ok(merged)
}
