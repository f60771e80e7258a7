//! Inventory settlement for paying a purchase request.
//!
//! Settlement is a compensating sequence: each line is decremented with
//! `ProductStore::apply_sale`; if any line fails, the lines this attempt
//! applied are reverted in reverse order. Movements the store already held for
//! the request are left alone, since another payer may own them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use common::RequestId;
use storage::{ProductStore, PurchaseRequest, StockMovement};

use crate::error::{DomainError, Result};

/// Requests whose payment is in progress in this process.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight {
    ids: Arc<Mutex<HashSet<RequestId>>>,
}

impl InFlight {
    /// Claims a request. Returns `None` if it is already being settled.
    pub(crate) fn claim(&self, id: RequestId) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        ids.insert(id).then(|| InFlightGuard {
            ids: self.ids.clone(),
            id,
        })
    }
}

/// Releases the claim on drop.
pub(crate) struct InFlightGuard {
    ids: Arc<Mutex<HashSet<RequestId>>>,
    id: RequestId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Stock movements applied by one settlement attempt.
#[derive(Debug, Default)]
pub(crate) struct AppliedSales {
    movements: Vec<StockMovement>,
}

impl AppliedSales {
    pub(crate) fn len(&self) -> usize {
        self.movements.len()
    }

    /// Reverts every applied movement, newest first.
    ///
    /// All movements are attempted; the first failure is returned.
    #[tracing::instrument(skip(self, store), fields(movements = self.movements.len()))]
    pub(crate) async fn compensate<P: ProductStore>(self, store: &P) -> Result<()> {
        let mut first_error = None;
        for movement in self.movements.iter().rev() {
            tracing::warn!(
                request_id = %movement.request_id,
                product_id = %movement.product_id,
                quantity = movement.quantity,
                "reverting stock movement"
            );
            metrics::counter!("inventory_compensations_total").increment(1);
            if let Err(e) = store.revert_sale(movement).await {
                tracing::error!(
                    product_id = %movement.product_id,
                    error = %e,
                    "failed to revert stock movement"
                );
                first_error.get_or_insert(DomainError::Storage(e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Decrements stock for every line of the request.
///
/// On failure the movements applied by this call are compensated and
/// `InventoryUpdate` names the line that failed.
pub(crate) async fn apply_sales<P: ProductStore>(
    store: &P,
    request: &PurchaseRequest,
) -> Result<AppliedSales> {
    let mut applied = AppliedSales::default();

    for item in &request.items {
        let movement = StockMovement::new(request.id, item.product_id.clone(), item.quantity);
        match store.apply_sale(&movement).await {
            Ok(level) if level.applied => {
                tracing::info!(
                    product_id = %level.product_id,
                    remaining = level.remaining,
                    deactivated = level.deactivated,
                    "stock decremented"
                );
                applied.movements.push(movement);
            }
            Ok(level) => {
                tracing::info!(
                    product_id = %level.product_id,
                    remaining = level.remaining,
                    "stock movement already recorded"
                );
            }
            Err(e) => {
                tracing::warn!(
                    product_id = %item.product_id,
                    error = %e,
                    applied = applied.len(),
                    "stock decrement failed, compensating"
                );
                applied.compensate(store).await?;
                return Err(DomainError::InventoryUpdate {
                    product_id: item.product_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(applied)
}
