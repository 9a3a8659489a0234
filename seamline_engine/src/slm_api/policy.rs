//! The authorization policy and the transition table, in one place.
//!
//! Every owner-scoped operation answers the same two questions: "may this caller touch this
//! resource?" and "is this lifecycle request legal from the current status?". Both answers live
//! here so that no handler re-implements them with ad hoc string checks.

use crate::{
    db_types::{OrderAction, OrderStatusType, Role},
    traits::OrderApiError,
};

/// Management scope: admins may act on anything, a manager only on resources they own, buyers on
/// nothing.
pub fn can_manage(role: Role, caller_uid: &str, owner_uid: &str) -> bool {
    match role {
        Role::Admin => true,
        Role::Manager => caller_uid == owner_uid,
        Role::Buyer => false,
    }
}

/// Read scope for a single order: the buyer who placed it, the manager owning the product, or an
/// admin. `manager_uid` is `None` when the product has since been delisted; such orders stay
/// visible to their buyer and to admins only.
pub fn can_view_order(role: Role, caller_uid: &str, buyer_uid: &str, manager_uid: Option<&str>) -> bool {
    match role {
        Role::Admin => true,
        Role::Manager => manager_uid == Some(caller_uid),
        Role::Buyer => caller_uid == buyer_uid,
    }
}

/// The order-lifecycle transition table. `pending` is the only state that admits any action;
/// approved, rejected and cancelled are terminal.
pub fn check_transition(status: OrderStatusType, action: OrderAction) -> Result<(), OrderApiError> {
    use OrderAction::*;
    use OrderStatusType::*;
    match (status, action) {
        (Pending, Approve) | (Pending, Reject) | (Pending, Cancel) => Ok(()),
        (status, action) => Err(OrderApiError::IllegalStateChange { status, action }),
    }
}
