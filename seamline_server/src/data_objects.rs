use std::fmt::Display;

use chrono::{DateTime, Utc};
use seamline_engine::{
    db_types::{OrderStatusType, Role},
    order_objects::OrderQueryFilter,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The query parameters accepted by the order search endpoints. This is deliberately narrower
/// than [`OrderQueryFilter`]: who the results are scoped to is decided by the handler from the
/// caller's claims, never by the query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub status: Option<OrderStatusType>,
    pub product_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderSearchParams {
    pub fn into_filter(self) -> OrderQueryFilter {
        let mut filter = OrderQueryFilter::default();
        if let Some(status) = self.status {
            filter = filter.with_status(status);
        }
        if let Some(product_id) = self.product_id {
            filter = filter.with_product_id(product_id);
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        if let Some(until) = self.until {
            filter = filter.until(until);
        }
        filter
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSearchParams {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowOnHomeParams {
    pub show: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkShowOnHomeParams {
    pub ids: Vec<i64>,
    pub show: bool,
}
