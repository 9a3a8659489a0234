use slm_common::Money;
use thiserror::Error;

use crate::db_types::{NewPayment, Payment};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentApiError {
    #[error("Could not connect to the database. {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("No payment has been recorded for order {0}")]
    PaymentNotFound(i64),
    #[error("Order {0} does not require an online payment")]
    PaymentNotRequired(i64),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(i64),
    #[error("Payment of {paid} does not match the order price of {expected}")]
    AmountMismatch { expected: Money, paid: Money },
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("You do not have permission to act on this payment")]
    Forbidden,
}

impl From<sqlx::Error> for PaymentApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<super::OrderApiError> for PaymentApiError {
    fn from(e: super::OrderApiError) -> Self {
        match e {
            super::OrderApiError::OrderNotFound(id) => Self::OrderNotFound(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

/// Storage contract for payment records.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Saves the payment and marks the order paid in a single transaction. If a payment with the
    /// same `transaction_id` already exists nothing further is done and the stored record is
    /// returned with `false`, so gateway retries are harmless.
    async fn insert_payment(&self, payment: NewPayment) -> Result<(Payment, bool), PaymentApiError>;

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, PaymentApiError>;
}
