//! Plain-text receipts for paid purchase requests.

use std::fmt;

use chrono::{DateTime, Utc};
use common::{Money, RequestId, RequestStatus};
use serde::{Deserialize, Serialize};
use storage::Profile;

use crate::error::{DomainError, Result};
use crate::purchase::PurchaseRequestDetails;

const NOT_AVAILABLE: &str = "N/A";

/// One purchased line on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: u32,
    pub line_total: Money,
}

/// Proof of payment for a purchase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The receipt shares the request's id.
    pub receipt_id: RequestId,
    pub paid_at: DateTime<Utc>,
    pub customer_name: String,
    pub customer_email: String,
    pub farmer_name: String,
    pub farmer_email: String,
    pub farmer_address: String,
    pub lines: Vec<ReceiptLine>,
    pub total: Money,
}

impl Receipt {
    /// Builds the receipt of a paid request.
    ///
    /// Fails with `ReceiptUnavailable` for any other status. Missing profile
    /// fields are shown as `N/A`.
    pub fn for_request(details: &PurchaseRequestDetails) -> Result<Self> {
        let request = &details.request;
        if request.status != RequestStatus::Paid {
            return Err(DomainError::ReceiptUnavailable {
                id: request.id,
                status: request.status,
            });
        }

        let customer = details.customer.as_ref();
        let farmer = details.farmer.as_ref();

        Ok(Self {
            receipt_id: request.id,
            paid_at: request.updated_at,
            customer_name: customer
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            customer_email: email_of(customer),
            farmer_name: farmer
                .and_then(|p| p.full_name.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            farmer_email: email_of(farmer),
            farmer_address: farmer
                .and_then(|p| p.address.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            lines: details
                .lines
                .iter()
                .map(|line| ReceiptLine {
                    name: line.product_name(),
                    quantity: line.item.quantity,
                    line_total: line.line_total(),
                })
                .collect(),
            total: request.total_amount,
        })
    }
}

fn email_of(profile: Option<&Profile>) -> String {
    profile
        .map(|p| p.email.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AGROCONNECT RECEIPT")?;
        writeln!(f)?;
        writeln!(f, "Receipt ID: {}", self.receipt_id)?;
        writeln!(f, "Date: {}", self.paid_at.format("%Y-%m-%d"))?;
        writeln!(f, "Time: {}", self.paid_at.format("%H:%M:%S UTC"))?;
        writeln!(f)?;
        writeln!(f, "CUSTOMER DETAILS:")?;
        writeln!(f, "Name: {}", self.customer_name)?;
        writeln!(f, "Email: {}", self.customer_email)?;
        writeln!(f)?;
        writeln!(f, "FARMER DETAILS:")?;
        writeln!(f, "Name: {}", self.farmer_name)?;
        writeln!(f, "Email: {}", self.farmer_email)?;
        writeln!(f, "Address: {}", self.farmer_address)?;
        writeln!(f)?;
        writeln!(f, "ITEMS PURCHASED:")?;
        for line in &self.lines {
            writeln!(f, "- {} x {} ({})", line.name, line.quantity, line.line_total)?;
        }
        writeln!(f)?;
        writeln!(f, "TOTAL AMOUNT: {}", self.total)?;
        writeln!(f, "PAYMENT STATUS: PAID")?;
        writeln!(f)?;
        write!(f, "Thank you for using AgroConnect!")
    }
}
