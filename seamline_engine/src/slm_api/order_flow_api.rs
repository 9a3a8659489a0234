use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, NewTrackingUpdate, Order, OrderAction, OrderStatusType, Role, TrackingUpdate},
    order_objects::{OrderQueryFilter, Timeline},
    slm_api::policy,
    traits::{CatalogManagement, OrderApiError, OrderManagement},
};

/// `OrderFlowApi` drives the order lifecycle: creation against live stock, the
/// pending→approved/rejected/cancelled transitions, and the append-only fulfilment log with its
/// derived timeline. Callers are identified by their uid and [`Role`]; every owner-scoped rule
/// goes through [`policy`] so the scoping logic exists exactly once.
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.db)
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Places a new order on behalf of the buyer identified in `order`.
    ///
    /// The storage layer performs the stock reservation and the insert as one atomic unit, so two
    /// concurrent orders can never jointly oversubscribe a product's stock. No mutation survives
    /// a failed validation.
    pub async fn place_order(&self, order: NewOrder) -> Result<Order, OrderApiError> {
        validate_new_order(&order)?;
        let order = self.db.create_order(order).await?;
        info!(
            "🔄️📦️ Order #{} placed by {} against product {}: {} unit(s) for {}",
            order.id, order.buyer_email, order.product_id, order.quantity, order.order_price
        );
        Ok(order)
    }

    /// Fetches a single order, enforcing read scope: the buyer who placed it, the manager owning
    /// the product, or an admin.
    pub async fn fetch_order(&self, id: i64, caller_uid: &str, role: Role) -> Result<Order, OrderApiError> {
        let order = self.db.fetch_order(id).await?.ok_or(OrderApiError::OrderNotFound(id))?;
        let product = self.db.fetch_product(order.product_id).await.map_err(OrderApiError::from)?;
        let manager_uid = product.as_ref().map(|p| p.manager_uid.as_str());
        if !policy::can_view_order(role, caller_uid, &order.buyer_uid, manager_uid) {
            debug!("🔄️ {caller_uid} ({role}) may not view order #{id}");
            return Err(OrderApiError::Forbidden);
        }
        Ok(order)
    }

    /// Fetches orders matching the query. The caller is responsible for scoping the filter; the
    /// route layer restricts managers to [`OrderQueryFilter::with_manager`] and buyers to
    /// [`OrderQueryFilter::with_buyer`].
    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        trace!("🔄️ Searching orders. {query}");
        self.db.search_orders(query).await
    }

    /// Approves a pending order. `caller_uid` must be an admin or the manager owning the product.
    /// Sets `approved_at` and opens the order for fulfilment tracking.
    pub async fn approve_order(&self, id: i64, caller_uid: &str, role: Role) -> Result<Order, OrderApiError> {
        let order = self.modify_order_status(id, OrderAction::Approve, caller_uid, role).await?;
        info!("🔄️✅️ Order #{id} approved by {caller_uid}");
        Ok(order)
    }

    /// Rejects a pending order and returns the reserved stock to the product, in the same
    /// transaction as the status write. `caller_uid` must be an admin or the owning manager.
    pub async fn reject_order(&self, id: i64, caller_uid: &str, role: Role) -> Result<Order, OrderApiError> {
        let order = self.modify_order_status(id, OrderAction::Reject, caller_uid, role).await?;
        info!("🔄️❌️ Order #{id} rejected by {caller_uid}. {} unit(s) returned to stock", order.quantity);
        Ok(order)
    }

    /// Cancels a pending order. Only the buyer who placed the order may cancel it, and only while
    /// it is still pending. Sets `cancelled_at`.
    pub async fn cancel_order(&self, id: i64, caller_uid: &str, role: Role) -> Result<Order, OrderApiError> {
        let order = self.modify_order_status(id, OrderAction::Cancel, caller_uid, role).await?;
        info!("🔄️↩️ Order #{id} cancelled by its buyer");
        Ok(order)
    }

    /// Applies a lifecycle action to an order.
    ///
    /// | Current status | approve | reject | cancel |
    /// |----------------|---------|--------|--------|
    /// | pending        | ✅      | ✅     | ✅     |
    /// | approved       | ❌      | ❌     | ❌     |
    /// | rejected       | ❌      | ❌     | ❌     |
    /// | cancelled      | ❌      | ❌     | ❌     |
    ///
    /// Approve and reject are owner-scoped to the product's manager (admins bypass ownership);
    /// cancel is restricted to the order's buyer. An illegal row in the table above fails with
    /// [`OrderApiError::IllegalStateChange`]; the storage layer re-checks the `pending` guard
    /// inside the UPDATE itself, so a transition that loses a race fails the same way instead of
    /// overwriting a terminal state.
    async fn modify_order_status(
        &self,
        id: i64,
        action: OrderAction,
        caller_uid: &str,
        role: Role,
    ) -> Result<Order, OrderApiError> {
        let order = self.db.fetch_order(id).await?.ok_or(OrderApiError::OrderNotFound(id))?;
        let authorized = match action {
            OrderAction::Cancel => role == Role::Buyer && caller_uid == order.buyer_uid,
            // Admins may act on any order, including those whose product has been delisted.
            OrderAction::Approve | OrderAction::Reject if role == Role::Admin => true,
            OrderAction::Approve | OrderAction::Reject => {
                let product = self
                    .db
                    .fetch_product(order.product_id)
                    .await
                    .map_err(OrderApiError::from)?
                    .ok_or(OrderApiError::ProductNotFound(order.product_id))?;
                policy::can_manage(role, caller_uid, &product.manager_uid)
            },
        };
        if !authorized {
            warn!("🔄️ {caller_uid} ({role}) tried to {action} order #{id} without permission");
            return Err(OrderApiError::Forbidden);
        }
        policy::check_transition(order.status, action)?;
        self.db.transition_order(id, action).await
    }

    /// Marks a pending order approved after a payment confirmation. This is the system-initiated
    /// path used by the payment webhook: it follows the same transition table as a manual
    /// approval but carries no caller, and answers `Ok(None)` when the order has already left
    /// `pending`, so gateway retries stay harmless.
    pub async fn approve_on_payment(&self, id: i64) -> Result<Option<Order>, OrderApiError> {
        let order = self.db.fetch_order(id).await?.ok_or(OrderApiError::OrderNotFound(id))?;
        if policy::check_transition(order.status, OrderAction::Approve).is_err() {
            debug!("🔄️ Order #{id} is {}; payment confirmation does not change it", order.status);
            return Ok(None);
        }
        match self.db.transition_order(id, OrderAction::Approve).await {
            Ok(order) => {
                info!("🔄️✅️ Order #{id} auto-approved on payment confirmation");
                Ok(Some(order))
            },
            Err(OrderApiError::IllegalStateChange { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Appends an entry to the fulfilment log of an approved order. `caller_uid` must be an admin
    /// or the owning manager. The log is append-only and tolerates repeated stages; nothing is
    /// ever de-duplicated or rewritten.
    pub async fn add_tracking(
        &self,
        id: i64,
        caller_uid: &str,
        role: Role,
        update: NewTrackingUpdate,
    ) -> Result<TrackingUpdate, OrderApiError> {
        if update.location.trim().is_empty() {
            return Err(OrderApiError::MissingField("location"));
        }
        let order = self.db.fetch_order(id).await?.ok_or(OrderApiError::OrderNotFound(id))?;
        let authorized = match role {
            Role::Admin => true,
            Role::Manager => {
                let product = self.db.fetch_product(order.product_id).await.map_err(OrderApiError::from)?;
                product.map(|p| policy::can_manage(role, caller_uid, &p.manager_uid)).unwrap_or(false)
            },
            Role::Buyer => false,
        };
        if !authorized {
            warn!("🔄️ {caller_uid} ({role}) tried to add tracking to order #{id} without permission");
            return Err(OrderApiError::Forbidden);
        }
        if order.status != OrderStatusType::Approved {
            return Err(OrderApiError::TrackingUnavailable { id, status: order.status });
        }
        let update = self.db.append_tracking(id, update).await?;
        info!("🔄️🧵️ Order #{id} moved to '{}' at {}", update.stage, update.location);
        Ok(update)
    }

    /// The derived timeline for an order, within the same read scope as [`fetch_order`].
    ///
    /// [`fetch_order`]: Self::fetch_order
    pub async fn tracking_timeline(&self, id: i64, caller_uid: &str, role: Role) -> Result<Timeline, OrderApiError> {
        let order = self.fetch_order(id, caller_uid, role).await?;
        let log = self.db.tracking_log(id).await?;
        Ok(Timeline::derive(&order, &log))
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), OrderApiError> {
    if order.quantity < 1 {
        return Err(OrderApiError::InvalidQuantity(order.quantity));
    }
    let required = [
        ("buyer_uid", &order.buyer_uid),
        ("buyer_email", &order.buyer_email),
        ("first_name", &order.first_name),
        ("last_name", &order.last_name),
        ("contact_number", &order.contact_number),
        ("delivery_address", &order.delivery_address),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(OrderApiError::MissingField(field));
        }
    }
    Ok(())
}
