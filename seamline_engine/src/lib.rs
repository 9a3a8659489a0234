//! Seamline order engine
//!
//! Seamline is a made-to-order garment marketplace. This library contains the core logic for the
//! order side of the platform: the product catalogue, the order lifecycle with its stock
//! accounting, fulfilment tracking, payments, and the user records that tie them together. It is
//! front-end agnostic; the HTTP surface lives in `seamline_server`.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`] and the [`mod@traits`] it implements).
//!    SQLite is the default backend; a Postgres backend can slot into the same traits. You should
//!    never need to access the database directly. Instead, use the public API provided by the
//!    engine. The exception is the data types stored in the database, which are defined in
//!    [`db_types`] and are public.
//! 2. The engine public API (`slm_api`, re-exported from the crate root). This provides the
//!    public-facing functionality: the catalogue, order flow, payments and users, with all the
//!    role scoping and lifecycle rules applied. Specific backends need to implement the traits in
//!    [`mod@traits`] in order to serve these APIs.
pub mod db_types;
pub mod helpers;
mod slm_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use slm_api::{
    catalog_api::CatalogApi,
    catalog_objects,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::PaymentApi,
    policy,
    user_api::UserApi,
    user_objects,
};
