//! Purchase request lifecycle.

mod details;
mod service;
mod settlement;

pub use details::{DetailLine, PurchaseRequestDetails};
pub use service::PurchaseRequestService;
