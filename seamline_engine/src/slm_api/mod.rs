//! # Seamline engine public API
//!
//! The `slm_api` module exposes the programmatic API for the Seamline order engine.
//! The API is modular, so that clients can pick and choose the functionality they want, and
//! different parts (e.g. the catalogue and the order flow) could in principle run against
//! different backends.
//!
//! * [`catalog_api`] manages the product catalogue: listings, search and pagination, owner-scoped
//!   edits, and the home page selection.
//! * [`order_flow_api`] is the primary API for the order lifecycle: placing orders against live
//!   stock, approving, rejecting and cancelling them, and the fulfilment tracking log.
//! * [`payment_api`] records payment captures and gateway confirmations against orders.
//! * [`user_api`] covers registration, profiles, and the admin role and suspension controls.
//!
//! [`policy`] holds the role scoping rules and the order transition table that the APIs share,
//! and the `*_objects` modules carry the query, pagination and projection types.
//!
//! # API usage
//!
//! The pattern for all the APIs is the same. An instance is created by supplying a database
//! backend that implements the traits the API requires.
//!
//! ```rust,ignore
//! use seamline_engine::{OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/seamline.db").await?;
//! // SqliteDatabase implements OrderManagement and CatalogManagement
//! let api = OrderFlowApi::new(db);
//! let order = api.place_order(new_order).await?;
//! ```

pub mod catalog_api;
pub mod catalog_objects;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
pub mod policy;
pub mod user_api;
pub mod user_objects;
