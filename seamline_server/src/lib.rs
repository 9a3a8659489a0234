//! # Seamline server
//! This module hosts the REST server for the Seamline marketplace. It is responsible for:
//! Authenticating users and issuing role-scoped access tokens.
//! Exposing the catalog, order, tracking, user and payment operations over HTTP.
//! Listening for signed payment confirmations from the payment gateway.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The public surface is `/health`, `/auth`, `/api/register` and the read-only catalog routes
//! under `/api/products`. Everything else under `/api` requires a bearer access token, and
//! `/webhook/payment` requires a valid HMAC signature from the payment gateway.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
