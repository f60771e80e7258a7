//! Farmer sales summary.

use common::{Money, RequestStatus, UserId};
use serde::{Deserialize, Serialize};
use storage::PurchaseRequest;

/// Aggregate view of the requests addressed to one farmer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerSalesSummary {
    pub farmer_id: UserId,
    pub total_requests: usize,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub paid: usize,
    /// Sum of `total_amount` over paid requests.
    pub revenue: Money,
    /// Units sold across paid requests.
    pub units_sold: u64,
    /// Value of requests awaiting a decision or payment.
    pub open_value: Money,
}

impl FarmerSalesSummary {
    /// Summarizes the given requests. Requests for other farmers are ignored.
    pub fn from_requests<'a>(
        farmer_id: UserId,
        requests: impl IntoIterator<Item = &'a PurchaseRequest>,
    ) -> Self {
        let mut summary = Self {
            farmer_id,
            ..Self::default()
        };

        for request in requests
            .into_iter()
            .filter(|request| request.farmer_id == farmer_id)
        {
            summary.total_requests += 1;
            match request.status {
                RequestStatus::Pending => {
                    summary.pending += 1;
                    summary.open_value += request.total_amount;
                }
                RequestStatus::Accepted => {
                    summary.accepted += 1;
                    summary.open_value += request.total_amount;
                }
                RequestStatus::Rejected => summary.rejected += 1,
                RequestStatus::Paid => {
                    summary.paid += 1;
                    summary.revenue += request.total_amount;
                    summary.units_sold += u64::from(request.total_quantity());
                }
            }
        }

        summary
    }
}
