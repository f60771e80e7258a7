//! Domain layer for the AgroConnect marketplace.
//!
//! This crate provides:
//! - [`Cart`], the customer's in-progress selection from one farmer
//! - [`PurchaseRequestService`], the request lifecycle from creation through
//!   payment, including the inventory settlement that payment triggers
//! - catalog browsing, request details, receipts and farmer sales summaries

pub mod cart;
pub mod catalog;
pub mod error;
pub mod purchase;
pub mod receipt;
pub mod sales;

pub use cart::{Cart, CartItem, NewPurchaseRequest};
pub use catalog::{CatalogFilter, browse, withdraw};
pub use error::{DomainError, Result};
pub use purchase::{DetailLine, PurchaseRequestDetails, PurchaseRequestService};
pub use receipt::{Receipt, ReceiptLine};
pub use sales::FarmerSalesSummary;
