//! # Storage backend contracts.
//!
//! This module defines the interface contracts a storage backend must implement to host the
//! Seamline marketplace. The traits carry the atomicity obligations (stock reservation, guarded
//! status transitions, idempotent payment capture); the business rules that decide whether a
//! caller may perform an operation live above them, in [`crate::OrderFlowApi`] and friends.
//!
//! * [`OrderManagement`] covers order creation, lifecycle transitions and the fulfilment log.
//! * [`CatalogManagement`] covers product CRUD, search, stats and homepage curation.
//! * [`UserManagement`] covers user records, profiles and suspensions.
//! * [`PaymentManagement`] covers payment capture and lookup.
mod catalog_management;
mod order_management;
mod payment_management;
mod user_management;

pub use catalog_management::{CatalogApiError, CatalogManagement};
pub use order_management::{OrderApiError, OrderManagement};
pub use payment_management::{PaymentApiError, PaymentManagement};
pub use user_management::{UserApiError, UserManagement};
