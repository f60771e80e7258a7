//! Shared types for the marketplace crates.
//!
//! Identifiers are newtypes so a farmer's user id can never be passed where a
//! product id is expected, and [`Money`] keeps every amount in minor units.

pub mod money;
pub mod status;
pub mod types;

pub use money::{Money, MoneyParseError};
pub use status::RequestStatus;
pub use types::{ProductId, RequestId, UserId};
