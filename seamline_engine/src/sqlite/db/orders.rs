use log::trace;
use slm_common::Money;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderAction, PaymentStatusType, TrackingId},
    order_objects::OrderQueryFilter,
};

/// Inserts a new order using the given connection. This is not atomic on its own; embed the call
/// inside the stock reservation transaction and pass `&mut *tx` as the connection argument.
///
/// The price, tracking id and payment mode are computed by the caller from the product row as it
/// stands *inside* that transaction, so the stored snapshot can never drift from the stock that
/// was reserved.
pub async fn insert_order(
    order: NewOrder,
    tracking_id: &TrackingId,
    order_price: Money,
    requires_online_payment: bool,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                tracking_id,
                product_id,
                buyer_uid,
                buyer_email,
                first_name,
                last_name,
                contact_number,
                delivery_address,
                notes,
                quantity,
                order_price,
                payment_option,
                requires_online_payment
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *;
        "#,
    )
    .bind(tracking_id.as_str())
    .bind(order.product_id)
    .bind(order.buyer_uid)
    .bind(order.buyer_email)
    .bind(order.first_name)
    .bind(order.last_name)
    .bind(order.contact_number)
    .bind(order.delivery_address)
    .bind(order.notes)
    .bind(order.quantity)
    .bind(order_price)
    .bind(order.payment_option)
    .bind(requires_online_payment)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_tracking_id(
    tracking_id: &TrackingId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE tracking_id = $1")
        .bind(tracking_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at`, most recent first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_uid) = query.buyer_uid {
        where_clause.push("buyer_uid = ");
        where_clause.push_bind_unseparated(buyer_uid);
    }
    if let Some(manager_uid) = query.manager_uid {
        where_clause.push("product_id IN (SELECT id FROM products WHERE manager_uid = ");
        where_clause.push_bind_unseparated(manager_uid);
        where_clause.push_unseparated(")");
    }
    if let Some(product_id) = query.product_id {
        where_clause.push("product_id = ");
        where_clause.push_bind_unseparated(product_id);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// Applies a lifecycle action to the order, guarded so that only pending orders move. Returns
/// `None` when the guard misses, i.e. the order does not exist or has already left `pending`;
/// the caller decides which of the two it was.
pub(crate) async fn transition_order(
    id: i64,
    action: OrderAction,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let sql = match action {
        OrderAction::Approve => {
            "UPDATE orders SET status = 'approved', approved_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
             WHERE id = $1 AND status = 'pending' RETURNING *"
        },
        OrderAction::Reject => {
            "UPDATE orders SET status = 'rejected', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = \
             'pending' RETURNING *"
        },
        OrderAction::Cancel => {
            "UPDATE orders SET status = 'cancelled', cancelled_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
             WHERE id = $1 AND status = 'pending' RETURNING *"
        },
    };
    let order = sqlx::query_as(sql).bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub(crate) async fn set_payment_status(
    order_id: i64,
    status: PaymentStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET payment_status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
