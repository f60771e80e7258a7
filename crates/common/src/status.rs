//! Purchase request status machine.

use serde::{Deserialize, Serialize};

/// The status of a purchase request in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Accepted ──► Paid
///           │
///           └──► Rejected
/// ```
/// Only `Pending` and `Rejected` requests may be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Submitted by the customer, awaiting the farmer's decision.
    #[default]
    Pending,

    /// The farmer agreed to sell; awaiting payment.
    Accepted,

    /// The farmer declined the request.
    Rejected,

    /// Paid by the customer and inventory settled (terminal state).
    Paid,
}

impl RequestStatus {
    /// Returns true if the farmer can accept the request in this state.
    pub fn can_accept(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    /// Returns true if the farmer can reject the request in this state.
    pub fn can_reject(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    /// Returns true if the customer can pay in this state.
    pub fn can_pay(&self) -> bool {
        matches!(self, RequestStatus::Accepted)
    }

    /// Returns true if the request can be deleted in this state.
    pub fn can_delete(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Rejected)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Paid)
    }

    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            "paid" => Ok(RequestStatus::Paid),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}
