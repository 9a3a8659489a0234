use thiserror::Error;

use crate::{
    db_types::{
        NewOrder,
        NewTrackingUpdate,
        Order,
        OrderAction,
        OrderStatusType,
        PaymentOption,
        TrackingId,
        TrackingUpdate,
    },
    order_objects::OrderQueryFilter,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderApiError {
    #[error("Could not connect to the database. {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Order quantity must be a positive number, not {0}")]
    InvalidQuantity(i64),
    #[error("This product does not accept {0} payments")]
    PaymentOptionNotOffered(PaymentOption),
    #[error("The minimum order quantity for this product is {min}, but {quantity} was requested")]
    BelowMinimumQuantity { quantity: i64, min: i64 },
    #[error("Only {available} unit(s) are in stock. An order for {quantity} cannot be fulfilled")]
    InsufficientStock { available: i64, quantity: i64 },
    #[error("The order total cannot be represented")]
    PriceOverflow,
    #[error("Cannot {action} an order that is {status}")]
    IllegalStateChange { status: OrderStatusType, action: OrderAction },
    #[error("Tracking updates can only be added to approved orders. Order {id} is {status}")]
    TrackingUnavailable { id: i64, status: OrderStatusType },
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("You do not have permission to act on this order")]
    Forbidden,
}

impl From<sqlx::Error> for OrderApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<super::CatalogApiError> for OrderApiError {
    fn from(e: super::CatalogApiError) -> Self {
        match e {
            super::CatalogApiError::ProductNotFound(id) => Self::ProductNotFound(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

/// The highest level of behaviour a storage backend must provide to host the order lifecycle.
///
/// Implementations supply the atomicity guarantees; the legality of a request (role scoping,
/// transition table) is decided above this trait in [`crate::OrderFlowApi`]. What an
/// implementation *must* guarantee:
/// * [`create_order`](Self::create_order) reserves stock and inserts the order as one unit, and
///   fails without any mutation when stock is insufficient, even under concurrent creation.
/// * [`transition_order`](Self::transition_order) only moves orders that are still `pending`,
///   even when two transitions race, and restores stock in the same unit when the action is
///   [`OrderAction::Reject`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// The URL of the database backend.
    fn url(&self) -> &str;

    /// Validate the new order against the product's stock rules, decrement the stock and insert
    /// the order, all in a single transaction.
    async fn create_order(&self, order: NewOrder) -> Result<Order, OrderApiError>;

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, OrderApiError>;

    async fn fetch_order_by_tracking_id(&self, tracking_id: &TrackingId) -> Result<Option<Order>, OrderApiError>;

    /// Fetches orders matching the filter, most recent first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError>;

    /// Applies `action` to the order. The update carries its own `status = 'pending'` guard, so a
    /// request that loses a race against another transition fails with
    /// [`OrderApiError::IllegalStateChange`] rather than clobbering a terminal state.
    async fn transition_order(&self, id: i64, action: OrderAction) -> Result<Order, OrderApiError>;

    /// Appends one entry to the order's fulfilment log.
    async fn append_tracking(&self, order_id: i64, update: NewTrackingUpdate)
        -> Result<TrackingUpdate, OrderApiError>;

    /// The full fulfilment log for an order, in append order.
    async fn tracking_log(&self, order_id: i64) -> Result<Vec<TrackingUpdate>, OrderApiError>;

    async fn close(&mut self) -> Result<(), OrderApiError>;
}
